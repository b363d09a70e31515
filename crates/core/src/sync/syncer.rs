use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{CatalogSource, SyncError, SyncOutcome};
use crate::cache::CatalogCache;

/// Refreshes a [`CatalogCache`] from a [`CatalogSource`], one refresh at a time.
///
/// This is cheaply cloneable; clones share the in-flight guard.
#[derive(Clone)]
pub struct CacheSyncer {
    cache: Arc<CatalogCache>,
    source: Arc<dyn CatalogSource>,
    in_flight: Arc<Mutex<()>>,
}

impl CacheSyncer {
    pub fn new(cache: Arc<CatalogCache>, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            cache,
            source,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    /// Refresh if the cache reports stale at `now`.
    ///
    /// Returns `Busy` without waiting when another sync holds the guard.
    pub async fn sync_if_stale(&self, now: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Sync already in progress");
            return Ok(SyncOutcome::Busy);
        };

        if !self.cache.should_refresh(now) {
            debug!("Cache is fresh, skipping sync");
            return Ok(SyncOutcome::Skipped);
        }

        self.refresh(now).await
    }

    /// Refresh regardless of freshness, waiting for any running sync first.
    pub async fn force_sync(&self, now: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        let _guard = self.in_flight.lock().await;
        self.refresh(now).await
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        info!("Refreshing catalog cache from source");

        // Fetch everything before touching the cache so a failed fetch
        // leaves the old mirror in place.
        let (records, raw_items) =
            tokio::try_join!(self.source.fetch_records(), self.source.fetch_raw_items())
                .inspect_err(|e| error!(error = %e, "Catalog fetch failed"))?;

        let outcome = SyncOutcome::Refreshed {
            records: records.len(),
            raw_items: raw_items.len(),
        };

        // Bulk SQLite writes block, so they run off the async worker threads.
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || -> Result<(), SyncError> {
            cache.save_normalized(&records)?;
            cache.save_raw(&raw_items)?;
            cache.mark_refreshed(now)?;
            Ok(())
        })
        .await
        .map_err(|e| SyncError::Task(e.to_string()))??;

        info!(?outcome, "Catalog cache refreshed");
        Ok(outcome)
    }
}
