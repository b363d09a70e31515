use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::DEFAULT_STALE_AFTER_DAYS;
use crate::schema::{DATABASE_NAME, SCHEMA_VERSION};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Schema version the cache is opened at.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            schema_version: default_schema_version(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(format!("{}.db", DATABASE_NAME))
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Refresh policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Whole calendar days after which the mirror is considered stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
        }
    }
}

fn default_stale_after_days() -> i64 {
    DEFAULT_STALE_AFTER_DAYS
}
