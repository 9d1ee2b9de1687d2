use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_START, GRID_SIZE, MAX_STEP};
use crate::error::{GridError, Result};
use crate::hasher::ContextHasher;
use crate::position::Position;

/// Start cell and hash seed for one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub start: Position,
    #[serde(default)]
    pub seed: u32,
}

impl ColumnSpec {
    pub fn new(start: Position, seed: u32) -> Self {
        Self { start, seed }
    }
}

/// Session-wide geometry. Read-only once a session is built; changing it
/// means rebuilding every path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,
    #[serde(default = "default_max_step")]
    pub max_step: u32,
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnSpec>,
}

fn default_grid_size() -> u32 {
    GRID_SIZE
}

fn default_max_step() -> u32 {
    MAX_STEP
}

fn default_columns() -> Vec<ColumnSpec> {
    vec![ColumnSpec::new(Position::from(DEFAULT_START), 0)]
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            max_step: MAX_STEP,
            columns: default_columns(),
        }
    }
}

impl GridConfig {
    pub fn with_columns(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(GridError::InvalidConfig("grid_size must be at least 1".into()));
        }
        if self.max_step == 0 {
            return Err(GridError::InvalidConfig("max_step must be at least 1".into()));
        }
        // One step must not be able to lap the grid.
        let span = self.max_step as u64 * 2 + 1;
        if span > self.grid_size as u64 {
            return Err(GridError::InvalidConfig(format!(
                "max_step {} needs a grid of at least {span} cells, got {}",
                self.max_step, self.grid_size
            )));
        }
        if self.columns.is_empty() {
            return Err(GridError::InvalidConfig("at least one column is required".into()));
        }
        Ok(())
    }

    pub fn hasher(&self) -> ContextHasher {
        ContextHasher::new(self.max_step)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column start cells wrapped onto this grid.
    pub fn seed_positions(&self) -> Vec<Position> {
        self.columns
            .iter()
            .map(|c| c.start.normalized(self.grid_size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reference() {
        let c = GridConfig::default();
        assert_eq!(c.grid_size, 64);
        assert_eq!(c.max_step, 3);
        assert_eq!(c.columns, vec![ColumnSpec::new(Position::new(15, 14), 0)]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_grid() {
        let c = GridConfig {
            grid_size: 0,
            ..GridConfig::default()
        };
        assert!(matches!(c.validate(), Err(GridError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_step() {
        let c = GridConfig {
            max_step: 0,
            ..GridConfig::default()
        };
        assert!(matches!(c.validate(), Err(GridError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_step_wider_than_grid() {
        let c = GridConfig {
            grid_size: 6,
            max_step: 3,
            ..GridConfig::default()
        };
        assert!(c.validate().is_err());

        let ok = GridConfig {
            grid_size: 7,
            max_step: 3,
            ..GridConfig::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_rejects_no_columns() {
        let c = GridConfig::with_columns(vec![]);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_seed_positions_wrap() {
        let c = GridConfig {
            grid_size: 16,
            max_step: 3,
            columns: vec![ColumnSpec::new(Position::new(20, 3), 1)],
        };
        assert_eq!(c.seed_positions(), vec![Position::new(4, 3)]);
    }

    #[test]
    fn test_serde_defaults() {
        let c: GridConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, GridConfig::default());
    }
}
