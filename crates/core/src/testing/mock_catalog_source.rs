//! Mock catalog source for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::CatalogRecord;
use crate::sync::{CatalogSource, SourceError};

/// Mock implementation of the CatalogSource trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable normalized records and raw payloads
/// - Count fetches for assertions
/// - Simulate failures
///
/// Clones share state, so a test can keep one clone to steer the mock while
/// the syncer owns another.
///
/// # Example
///
/// ```rust,ignore
/// use stampcache_core::testing::{MockCatalogSource, fixtures};
///
/// let source = MockCatalogSource::new();
/// source.set_records(fixtures::catalog_records(500)).await;
///
/// let records = source.fetch_records().await?;
/// assert_eq!(records.len(), 500);
/// ```
#[derive(Debug, Clone)]
pub struct MockCatalogSource {
    records: Arc<RwLock<Vec<CatalogRecord>>>,
    raw_items: Arc<RwLock<Vec<Value>>>,
    /// Number of `fetch_records` calls.
    fetches: Arc<RwLock<usize>>,
    /// If set, the next `fetch_records` will fail with this error.
    next_error: Arc<RwLock<Option<SourceError>>>,
}

impl Default for MockCatalogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogSource {
    /// Create a new mock source with no data.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            raw_items: Arc::new(RwLock::new(Vec::new())),
            fetches: Arc::new(RwLock::new(0)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the records returned by `fetch_records`.
    pub async fn set_records(&self, records: Vec<CatalogRecord>) {
        *self.records.write().await = records;
    }

    /// Set the payloads returned by `fetch_raw_items`.
    pub async fn set_raw_items(&self, items: Vec<Value>) {
        *self.raw_items.write().await = items;
    }

    /// Make the next `fetch_records` fail.
    pub async fn set_next_error(&self, error: SourceError) {
        *self.next_error.write().await = Some(error);
    }

    /// How many times `fetch_records` was called.
    pub async fn fetch_count(&self) -> usize {
        *self.fetches.read().await
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_records(&self) -> Result<Vec<CatalogRecord>, SourceError> {
        *self.fetches.write().await += 1;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.records.read().await.clone())
    }

    async fn fetch_raw_items(&self) -> Result<Vec<Value>, SourceError> {
        Ok(self.raw_items.read().await.clone())
    }
}
