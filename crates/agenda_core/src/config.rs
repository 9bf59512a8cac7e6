//! Store and logging configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how its pool behaves.
//! - Stay format-agnostic: callers deserialize from whatever source they use.
//!
//! # Invariants
//! - `validate()` must pass before a config is used to open a store.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Backing storage for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// Private in-memory database, lost when the store is dropped.
    Memory,
    /// SQLite database file, created on first open.
    File(PathBuf),
}

/// Configuration for [`crate::store::AgendaStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    /// Upper bound of pooled connections.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// In-memory store with default pool settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store with default pool settings.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroMaxConnections);
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyDatabasePath);
            }
        }
        Ok(())
    }
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_level(),
            log_dir: log_dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroMaxConnections,
    ZeroBusyTimeout,
    EmptyDatabasePath,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroMaxConnections => write!(f, "max_connections must be at least 1"),
            Self::ZeroBusyTimeout => write!(f, "busy_timeout_ms must be at least 1"),
            Self::EmptyDatabasePath => write!(f, "database file path cannot be empty"),
        }
    }
}

impl Error for ConfigError {}
