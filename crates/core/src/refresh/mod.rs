//! Refresh bookkeeping for the local mirror.
//!
//! Freshness is never stored. It is recomputed on each query from the single
//! `lastRefreshDate` metadata record and the caller's clock.

mod policy;

pub use policy::{calendar_days_between, parse_refresh_date, MetadataErrorCallback, RefreshPolicy};

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::store::CacheRecord;

/// Metadata key holding the date of the last successful refresh.
pub const LAST_REFRESH_KEY: &str = "lastRefreshDate";

/// A keyed metadata value. At most one entry exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl CacheRecord for MetadataEntry {
    fn record_id(&self) -> &str {
        &self.key
    }
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Refreshed within the staleness threshold.
    Fresh,
    /// Never refreshed, or refreshed too long ago.
    Stale,
    /// The metadata could not be read or understood.
    Unknown(MetadataError),
}

impl Freshness {
    /// Only a known-stale cache asks for a refresh; `Unknown` does not.
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Unknown(_) => "unknown",
        }
    }
}
