pub mod config_file;
pub mod error;
pub mod schema;
pub mod session_store;
pub mod store;

pub use config_file::{load_config, parse_config};
pub use error::{Result, StoreError};
pub use session_store::{SessionStore, default_base_dir, list_sessions};
pub use store::Store;
