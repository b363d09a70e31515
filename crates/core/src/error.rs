//! Error types for cache operations.
//!
//! Each concern has its own error so callers can tell "could not open" from
//! "could not write" without string matching. Migration problems never show
//! up here: they are logged and recorded in a `MigrationReport` instead.

use thiserror::Error;

/// The persistent store could not be opened at the requested schema version.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The environment refused access (missing directory, permissions, locked file).
    #[error("Access denied: {0}")]
    Denied(String),

    /// The database on disk was written by a newer schema version.
    #[error("Schema version conflict: database is at version {on_disk}, requested {requested}")]
    VersionConflict { on_disk: u32, requested: u32 },

    #[error("Database error: {0}")]
    Database(String),

    /// Deleting the database files during a reset failed.
    #[error("Reset failed: {0}")]
    Reset(String),
}

/// A bulk write did not persist every record.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to put record {id}: {message}")]
    Put { id: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An incoming raw payload could not be projected onto the stored shape.
    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// A store could not be queried. An empty store is not an error.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid page request: {0}")]
    InvalidPage(String),
}

/// Refresh metadata could not be read, written or interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Failed to read refresh metadata: {0}")]
    Read(String),

    #[error("Failed to write refresh metadata: {0}")]
    Write(String),

    #[error("Invalid refresh date: {0:?}")]
    InvalidDate(String),
}

/// Umbrella error for callers that drive several cache operations in a row.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_message() {
        let err = OpenError::VersionConflict {
            on_disk: 7,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Schema version conflict: database is at version 7, requested 6"
        );
    }

    #[test]
    fn test_cache_error_is_transparent() {
        let err: CacheError = WriteError::Put {
            id: "stamp-1".to_string(),
            message: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Failed to put record stamp-1: disk full");
        assert!(matches!(err, CacheError::Write(WriteError::Put { .. })));
    }
}
