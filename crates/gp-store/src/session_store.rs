use std::path::{Path, PathBuf};
use std::{env, fs};

use gp_core::Session;

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const DEFAULT_SESSION: &str = "default";

/// Default base directory for all gridpath storage.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".gridpath")
}

/// Sanitize a session name for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One SQLite file per named session.
///
/// Layout:
/// ```text
/// ~/.gridpath/
/// └── sessions/
///     ├── default.db
///     └── <name>.db
/// ```
pub struct SessionStore {
    store: Store,
    name: String,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Open (creating if needed) the store for `name` under `base_dir`.
    pub fn open(name: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let sessions_dir = base.join("sessions");
        fs::create_dir_all(&sessions_dir).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", sessions_dir.display()))
        })?;

        let name = sanitize_name(name.unwrap_or(DEFAULT_SESSION));
        if name.is_empty() {
            return Err(StoreError::InvalidData("session name is empty".into()));
        }
        let path = sessions_dir.join(format!("{name}.db"));
        let store = Store::open(&path)?;
        tracing::debug!(session = %name, path = %path.display(), "opened session store");

        Ok(Self {
            store,
            name,
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            name: "test".to_string(),
            path: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn load(&self) -> Result<Option<Session>> {
        self.store.load_session()
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.store.save_session(session)
    }

    /// Size of the backing file in bytes (0 for in-memory stores).
    pub fn db_size(&self) -> u64 {
        self.path
            .as_deref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

/// Names of the sessions stored under `base_dir`, sorted.
pub fn list_sessions(base_dir: Option<&Path>) -> Result<Vec<String>> {
    let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
    let sessions_dir = base.join("sessions");
    if !sessions_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = fs::read_dir(&sessions_dir)?
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("db") {
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            } else {
                None
            }
        })
        .collect();
    names.sort();
    Ok(names)
}
