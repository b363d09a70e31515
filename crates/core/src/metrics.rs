//! Prometheus metrics for the cache.
//!
//! This module provides metrics for:
//! - Store writes and reads
//! - Refresh decisions
//! - Schema migration steps and resets

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Record Store
// =============================================================================

/// Bulk writes by store and result.
pub static STORE_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stampcache_store_writes_total", "Total bulk writes"),
        &["store", "result"], // result: "ok", "failed"
    )
    .unwrap()
});

/// Records persisted by bulk writes.
pub static RECORDS_WRITTEN: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stampcache_records_written_total",
            "Total records persisted by bulk writes",
        ),
        &["store"],
    )
    .unwrap()
});

/// Reads by store, operation and result.
pub static STORE_READS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stampcache_store_reads_total", "Total store reads"),
        &["store", "op", "result"], // op: "get", "get_all", "count", "paginate"
    )
    .unwrap()
});

// =============================================================================
// Refresh Policy
// =============================================================================

/// Freshness evaluations by outcome.
pub static REFRESH_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stampcache_refresh_decisions_total",
            "Total freshness evaluations",
        ),
        &["decision"], // "fresh", "stale", "unknown"
    )
    .unwrap()
});

// =============================================================================
// Schema
// =============================================================================

/// Index migration steps by action and result.
pub static MIGRATION_STEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stampcache_migration_steps_total",
            "Total index migration steps",
        ),
        &["action", "result"], // action: "drop_index", "create_index"
    )
    .unwrap()
});

/// Destructive database resets.
pub static STORE_RESETS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("stampcache_store_resets_total", "Total database resets").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all cache metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(STORE_WRITES.clone()),
        Box::new(RECORDS_WRITTEN.clone()),
        Box::new(STORE_READS.clone()),
        Box::new(REFRESH_DECISIONS.clone()),
        Box::new(MIGRATION_STEPS.clone()),
        Box::new(STORE_RESETS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        STORE_RESETS.inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "stampcache_store_resets_total"));
    }
}
