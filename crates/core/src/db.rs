//! Handle to an opened cache database.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::error::OpenError;
use crate::metrics;
use crate::schema::{ensure_schema, MigrationReport};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// An open, migrated cache database.
///
/// All stores of one cache share this handle. Every operation holds the
/// connection lock for its full duration.
pub struct Database {
    conn: Mutex<Connection>,
    location: DatabaseLocation,
    schema_version: u32,
    migration: Mutex<MigrationReport>,
}

impl Database {
    /// Open (creating if needed) the database file at `path` at `schema_version`.
    pub fn open(path: &Path, schema_version: u32) -> Result<Self, OpenError> {
        Self::open_at(DatabaseLocation::File(path.to_path_buf()), schema_version)
    }

    /// Open a private in-memory database (useful for testing).
    pub fn in_memory(schema_version: u32) -> Result<Self, OpenError> {
        Self::open_at(DatabaseLocation::InMemory, schema_version)
    }

    fn open_at(location: DatabaseLocation, schema_version: u32) -> Result<Self, OpenError> {
        let (conn, report) = connect(&location, schema_version)?;
        info!(location = ?location, schema_version, "Cache database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
            schema_version,
            migration: Mutex::new(report),
        })
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Report of the migration run by the most recent open or reset.
    pub fn migration_report(&self) -> MigrationReport {
        self.migration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lock the connection.
    ///
    /// A panic while the lock was held leaves any open transaction to be
    /// rolled back by SQLite, so a poisoned lock is still usable.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delete the whole database and recreate it empty at the current schema version.
    ///
    /// Irreversible. Every store of this handle sees the empty database afterwards.
    pub fn reset(&self) -> Result<(), OpenError> {
        self.reset_with(remove_database_files)
    }

    /// Reset using `remove` to delete the files of a file-backed database.
    ///
    /// If removal or recreation fails, the database is reopened from
    /// whatever is left on disk before the error is returned.
    fn reset_with(
        &self,
        remove: impl FnOnce(&Path) -> Result<(), OpenError>,
    ) -> Result<(), OpenError> {
        let mut conn = self.conn();

        let placeholder =
            Connection::open_in_memory().map_err(|e| OpenError::Database(e.to_string()))?;
        let old = std::mem::replace(&mut *conn, placeholder);
        if let Err((old, e)) = old.close() {
            *conn = old;
            return Err(OpenError::Reset(e.to_string()));
        }

        let removed = match &self.location {
            DatabaseLocation::File(path) => remove(path),
            DatabaseLocation::InMemory => Ok(()),
        };

        match removed.and_then(|()| connect(&self.location, self.schema_version)) {
            Ok((fresh, report)) => {
                *conn = fresh;
                self.set_migration_report(report);
                metrics::STORE_RESETS.inc();
                info!(location = ?self.location, "Cache database reset");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Cache reset failed, reopening database");
                match connect(&self.location, self.schema_version) {
                    Ok((restored, report)) => {
                        *conn = restored;
                        self.set_migration_report(report);
                    }
                    Err(restore) => {
                        error!(error = %restore, "Could not reopen cache database after failed reset")
                    }
                }
                Err(e)
            }
        }
    }

    fn set_migration_report(&self, report: MigrationReport) {
        *self
            .migration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = report;
    }
}

fn connect(
    location: &DatabaseLocation,
    schema_version: u32,
) -> Result<(Connection, MigrationReport), OpenError> {
    let conn = match location {
        DatabaseLocation::File(path) => {
            let conn = Connection::open(path)
                .map_err(|e| OpenError::Denied(format!("{}: {}", path.display(), e)))?;
            // The WAL pragma is the first statement that touches the file, so
            // unreadable or locked files surface here.
            conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
                .map_err(|e| OpenError::Denied(format!("{}: {}", path.display(), e)))?;
            conn
        }
        DatabaseLocation::InMemory => {
            Connection::open_in_memory().map_err(|e| OpenError::Database(e.to_string()))?
        }
    };

    let report = ensure_schema(&conn, schema_version)?;
    Ok((conn, report))
}

/// Remove the database and its sidecar files. The main file goes last, so a
/// failure part way leaves a database that still opens.
fn remove_database_files(path: &Path) -> Result<(), OpenError> {
    let mut candidates = Vec::new();
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }
    candidates.push(path.to_path_buf());

    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => debug!(path = %candidate.display(), "Removed database file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(OpenError::Reset(format!(
                    "{}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }
    Ok(())
}
