//! The cache façade: the one surface views and the syncer talk to.
//!
//! Composes the database handle, the two record stores and the refresh
//! policy. Construct it explicitly and pass it around; there is no global
//! instance.

mod types;

pub use types::*;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{project_raw_items, CatalogRecord, RawCatalogItem};
use crate::config::Config;
use crate::db::Database;
use crate::error::{MetadataError, OpenError, ReadError, WriteError};
use crate::refresh::{Freshness, MetadataErrorCallback, RefreshPolicy};
use crate::schema::{
    MigrationReport, SCHEMA_VERSION, STORE_METADATA, STORE_RAW_ITEMS, STORE_STAMPS,
};
use crate::store::{clear_store, Page, RecordStore};

/// Default staleness threshold in calendar days.
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 7;

/// Local mirror of the remote stamp catalog.
pub struct CatalogCache {
    db: Arc<Database>,
    stamps: RecordStore<CatalogRecord>,
    raw_items: RecordStore<RawCatalogItem>,
    refresh: RefreshPolicy,
}

impl CatalogCache {
    /// Open the cache described by `config`.
    pub fn open(config: &Config) -> Result<Self, OpenError> {
        let db = Database::open(&config.database.path, config.database.schema_version)?;
        Ok(Self::from_database(
            Arc::new(db),
            config.refresh.stale_after_days,
        ))
    }

    /// Open a file-backed cache at `path` and `schema_version` with the default threshold.
    pub fn open_path(path: &Path, schema_version: u32) -> Result<Self, OpenError> {
        let db = Database::open(path, schema_version)?;
        Ok(Self::from_database(Arc::new(db), DEFAULT_STALE_AFTER_DAYS))
    }

    /// Create an in-memory cache at the current schema version (useful for testing).
    pub fn in_memory() -> Result<Self, OpenError> {
        let db = Database::in_memory(SCHEMA_VERSION)?;
        Ok(Self::from_database(Arc::new(db), DEFAULT_STALE_AFTER_DAYS))
    }

    /// Build a cache over an already opened database.
    pub fn from_database(db: Arc<Database>, stale_after_days: i64) -> Self {
        let stamps = RecordStore::new(Arc::clone(&db), STORE_STAMPS);
        let raw_items = RecordStore::new(Arc::clone(&db), STORE_RAW_ITEMS);
        let refresh = RefreshPolicy::new(
            RecordStore::new(Arc::clone(&db), STORE_METADATA),
            stale_after_days,
        );
        Self {
            db,
            stamps,
            raw_items,
            refresh,
        }
    }

    /// Report metadata failures swallowed by [`should_refresh`](Self::should_refresh) to `callback`.
    pub fn with_error_callback(mut self, callback: MetadataErrorCallback) -> Self {
        self.refresh = self.refresh.with_error_callback(callback);
        self
    }

    pub fn schema_version(&self) -> u32 {
        self.db.schema_version()
    }

    /// What the schema upgrade did when this cache was opened or last reset.
    pub fn migration_report(&self) -> MigrationReport {
        self.db.migration_report()
    }

    // ========================================================================
    // Normalized records
    // ========================================================================

    /// Replace every normalized record with `records`.
    pub fn save_normalized(&self, records: &[CatalogRecord]) -> Result<(), WriteError> {
        info!(count = records.len(), "Saving normalized catalog records");
        self.stamps.replace_all(records)
    }

    pub fn load_normalized(&self) -> Result<Vec<CatalogRecord>, ReadError> {
        self.stamps.get_all()
    }

    /// Like [`load_normalized`](Self::load_normalized), but a read failure
    /// is logged and reads as "nothing cached".
    pub fn load_normalized_or_empty(&self) -> Vec<CatalogRecord> {
        self.stamps.get_all().unwrap_or_else(|e| {
            warn!(error = %e, "Cached catalog unreadable, treating as empty");
            Vec::new()
        })
    }

    pub fn load_normalized_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Page<CatalogRecord>, ReadError> {
        self.stamps.paginate(offset, limit)
    }

    pub fn count_normalized(&self) -> Result<u64, ReadError> {
        self.stamps.count()
    }

    // ========================================================================
    // Raw items
    // ========================================================================

    /// Project each payload onto [`RawCatalogItem`] and replace the raw store.
    ///
    /// Unknown fields are dropped silently. If any payload cannot be
    /// projected, nothing is written.
    pub fn save_raw(&self, items: &[Value]) -> Result<(), WriteError> {
        let projected = project_raw_items(items)?;
        self.save_raw_items(&projected)
    }

    /// Replace the raw store with already projected items.
    pub fn save_raw_items(&self, items: &[RawCatalogItem]) -> Result<(), WriteError> {
        info!(count = items.len(), "Saving raw catalog items");
        self.raw_items.replace_all(items)
    }

    pub fn load_raw(&self) -> Result<Vec<RawCatalogItem>, ReadError> {
        self.raw_items.get_all()
    }

    pub fn load_raw_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Page<RawCatalogItem>, ReadError> {
        self.raw_items.paginate(offset, limit)
    }

    pub fn count_raw(&self) -> Result<u64, ReadError> {
        self.raw_items.count()
    }

    // ========================================================================
    // Whole cache
    // ========================================================================

    /// Clear the normalized and raw stores together. Refresh metadata stays.
    pub fn clear_all(&self) -> Result<(), WriteError> {
        let mut conn = self.db.conn();
        let tx = conn
            .transaction()
            .map_err(|e| WriteError::Database(e.to_string()))?;
        for store in [STORE_STAMPS, STORE_RAW_ITEMS] {
            let removed =
                clear_store(&tx, store).map_err(|e| WriteError::Database(e.to_string()))?;
            debug!(store, removed, "Cleared store");
        }
        tx.commit()
            .map_err(|e| WriteError::Database(e.to_string()))?;
        info!("Cleared cached catalog data");
        Ok(())
    }

    /// True iff no normalized records are cached.
    pub fn is_empty(&self) -> Result<bool, ReadError> {
        Ok(self.count_normalized()? == 0)
    }

    /// Counts and refresh state in one call.
    pub fn stats(&self) -> Result<CacheStats, ReadError> {
        Ok(CacheStats {
            normalized_records: self.count_normalized()?,
            raw_items: self.count_raw()?,
            last_refresh_date: self.refresh.last_refresh_date().unwrap_or_else(|e| {
                warn!(error = %e, "Could not read last refresh date");
                None
            }),
            schema_version: self.schema_version(),
        })
    }

    /// Delete the entire database and recreate it empty.
    ///
    /// Irreversible: records and refresh metadata are both gone afterwards.
    pub fn reset_store(&self) -> Result<(), OpenError> {
        warn!("Resetting catalog cache database");
        self.db.reset()
    }

    // ========================================================================
    // Refresh policy
    // ========================================================================

    /// See [`RefreshPolicy::should_refresh`].
    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh.should_refresh(now)
    }

    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        self.refresh.freshness(now)
    }

    pub fn mark_refreshed(&self, now: DateTime<Utc>) -> Result<(), MetadataError> {
        self.refresh.mark_refreshed(now)
    }

    pub fn last_refresh_date(&self) -> Result<Option<String>, MetadataError> {
        self.refresh.last_refresh_date()
    }

    /// Forget the last refresh date so the next check reports stale.
    pub fn reset_refresh_metadata(&self) -> Result<(), MetadataError> {
        self.refresh.clear_last_refresh_date()
    }
}
