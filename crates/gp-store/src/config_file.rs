//! TOML session configuration.
//!
//! ```toml
//! grid_size = 64
//! max_step = 3
//!
//! [[columns]]
//! start = { x = 15, y = 14 }
//! seed = 0
//! ```
//!
//! Missing keys take the defaults of [`GridConfig`]. The parsed config is
//! validated before it is returned.

use std::fs;
use std::path::Path;

use gp_core::GridConfig;

use crate::error::Result;

pub fn parse_config(content: &str) -> Result<GridConfig> {
    let config: GridConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<GridConfig> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        grid_size = config.grid_size,
        columns = config.columns.len(),
        "loaded config"
    );
    Ok(config)
}
