//! Keeping the mirror in step with the remote catalog.
//!
//! The remote API is abstracted as a [`CatalogSource`]; [`CacheSyncer`]
//! decides when to fetch and makes sure only one refresh writes at a time.

mod syncer;

pub use syncer::CacheSyncer;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::CatalogRecord;
use crate::error::{MetadataError, WriteError};

/// Upstream provider of catalog data.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full normalized catalog.
    async fn fetch_records(&self) -> Result<Vec<CatalogRecord>, SourceError>;

    /// Fetch the raw catalog items, unprojected.
    async fn fetch_raw_items(&self) -> Result<Vec<Value>, SourceError>;
}

/// Errors from the upstream source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from a sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching failed; the cache was not touched.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] SourceError),

    /// Writing failed; the refresh date was not advanced.
    #[error("Write failed: {0}")]
    Write(#[from] WriteError),

    /// Data was written but the refresh date could not be recorded.
    #[error("Failed to record refresh: {0}")]
    Metadata(#[from] MetadataError),

    /// The blocking write task did not complete.
    #[error("Write task failed: {0}")]
    Task(String),
}

/// Result of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cache was fresh (or its freshness unknown); nothing fetched.
    Skipped,
    /// Another sync was already running.
    Busy,
    /// The cache was replaced with fresh data.
    Refreshed { records: usize, raw_items: usize },
}
