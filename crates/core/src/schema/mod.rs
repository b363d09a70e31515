//! Versioned store layout and forward migration.
//!
//! The schema version lives in `PRAGMA user_version`. Opening at a higher
//! version than the one on disk runs the index migration; opening at a lower
//! one is refused.

mod layout;
mod migration;
mod sqlite;

pub use layout::*;
pub use migration::*;
pub use sqlite::SqliteSchema;

use rusqlite::Connection;

use crate::error::OpenError;

/// Schema version recorded in the database (0 for a brand new file).
pub fn on_disk_version(conn: &Connection) -> Result<u32, OpenError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, u32>(0))
        .map_err(|e| OpenError::Database(e.to_string()))
}

/// Make the database match the layout of `requested`, upgrading if needed.
///
/// Returns an empty report when the database is already at `requested`.
pub fn ensure_schema(conn: &Connection, requested: u32) -> Result<MigrationReport, OpenError> {
    if requested == 0 {
        return Err(OpenError::Database(
            "schema version must be at least 1".to_string(),
        ));
    }

    let on_disk = on_disk_version(conn)?;
    if on_disk > requested {
        return Err(OpenError::VersionConflict { on_disk, requested });
    }
    if on_disk == requested {
        return Ok(MigrationReport {
            from_version: on_disk,
            to_version: requested,
            ..MigrationReport::default()
        });
    }

    let layout = store_layout(requested);
    let report = run_migration(&SqliteSchema::new(conn), &layout, on_disk, requested)?;

    conn.pragma_update(None, "user_version", requested)
        .map_err(|e| OpenError::Database(e.to_string()))?;

    Ok(report)
}
