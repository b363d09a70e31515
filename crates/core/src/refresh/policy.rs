//! Staleness decision from the persisted refresh date.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error};

use super::{Freshness, MetadataEntry, LAST_REFRESH_KEY};
use crate::error::MetadataError;
use crate::metrics;
use crate::store::RecordStore;

/// Side channel for metadata failures that `should_refresh` swallows.
pub type MetadataErrorCallback = Arc<dyn Fn(&MetadataError) + Send + Sync>;

/// Parse a stored refresh date: `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_refresh_date(value: &str) -> Result<NaiveDate, MetadataError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| MetadataError::InvalidDate(value.to_string()))
}

/// Whole calendar days from `earlier` to `later` (negative if `later` is before).
pub fn calendar_days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// Decides whether the cached mirror should be re-fetched.
///
/// Nothing is cached in memory: every query reads the persisted date.
#[derive(Clone)]
pub struct RefreshPolicy {
    metadata: RecordStore<MetadataEntry>,
    stale_after_days: i64,
    on_error: Option<MetadataErrorCallback>,
}

impl RefreshPolicy {
    pub fn new(metadata: RecordStore<MetadataEntry>, stale_after_days: i64) -> Self {
        Self {
            metadata,
            stale_after_days,
            on_error: None,
        }
    }

    /// Also report swallowed metadata failures to `callback`.
    pub fn with_error_callback(mut self, callback: MetadataErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn stale_after_days(&self) -> i64 {
        self.stale_after_days
    }

    /// The recorded refresh date, or `None` if absent or blank.
    pub fn last_refresh_date(&self) -> Result<Option<String>, MetadataError> {
        let entry = self
            .metadata
            .get(LAST_REFRESH_KEY)
            .map_err(|e| MetadataError::Read(e.to_string()))?;

        Ok(entry
            .map(|entry| entry.value)
            .filter(|value| !value.trim().is_empty()))
    }

    /// Overwrite the recorded refresh date.
    pub fn set_last_refresh_date(&self, date: &str) -> Result<(), MetadataError> {
        self.metadata
            .put(&MetadataEntry::new(LAST_REFRESH_KEY, date))
            .map_err(|e| MetadataError::Write(e.to_string()))
    }

    /// Forget the recorded refresh date, making the next check stale.
    pub fn clear_last_refresh_date(&self) -> Result<(), MetadataError> {
        self.metadata
            .remove(LAST_REFRESH_KEY)
            .map(|_| ())
            .map_err(|e| MetadataError::Write(e.to_string()))
    }

    /// Record `now`, truncated to its calendar date, as the last refresh.
    pub fn mark_refreshed(&self, now: DateTime<Utc>) -> Result<(), MetadataError> {
        let date = now.date_naive().format("%Y-%m-%d").to_string();
        debug!(%date, "Marking cache refreshed");
        self.set_last_refresh_date(&date)
    }

    /// Freshness at `now`, with metadata failures kept distinct.
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        let freshness = match self.evaluate(now) {
            Ok(true) => Freshness::Stale,
            Ok(false) => Freshness::Fresh,
            Err(e) => {
                error!(error = %e, "Could not determine cache freshness");
                if let Some(callback) = &self.on_error {
                    callback(&e);
                }
                Freshness::Unknown(e)
            }
        };

        metrics::REFRESH_DECISIONS
            .with_label_values(&[freshness.label()])
            .inc();
        freshness
    }

    /// Whether the mirror should be re-fetched at `now`.
    ///
    /// Missing metadata means stale. Unreadable metadata means *not* stale:
    /// the failure goes to the log and the error callback instead.
    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        self.freshness(now).is_stale()
    }

    fn evaluate(&self, now: DateTime<Utc>) -> Result<bool, MetadataError> {
        let Some(stored) = self.last_refresh_date()? else {
            return Ok(true);
        };

        let last = parse_refresh_date(&stored)?;
        let elapsed = calendar_days_between(last, now.date_naive());
        Ok(elapsed > self.stale_after_days)
    }
}
