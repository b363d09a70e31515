//! Syncer integration tests against an on-disk cache.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use stampcache_core::{
    testing::{fixtures, MockCatalogSource},
    CacheSyncer, CatalogCache, SourceError, SyncError, SyncOutcome, SCHEMA_VERSION,
};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 18, 45, 0).unwrap()
}

fn create_syncer(dir: &TempDir, source: &MockCatalogSource) -> CacheSyncer {
    let cache = CatalogCache::open_path(&dir.path().join("cache.db"), SCHEMA_VERSION).unwrap();
    CacheSyncer::new(Arc::new(cache), Arc::new(source.clone()))
}

#[tokio::test]
async fn test_weekly_refresh_cycle() {
    let dir = TempDir::new().unwrap();
    let source = MockCatalogSource::new();
    source.set_records(fixtures::catalog_records(500)).await;
    source.set_raw_items(fixtures::raw_payloads(40)).await;
    let syncer = create_syncer(&dir, &source);

    let first = syncer.sync_if_stale(at(2024, 1, 1)).await.unwrap();
    assert_eq!(
        first,
        SyncOutcome::Refreshed {
            records: 500,
            raw_items: 40
        }
    );

    for day in 2..=8 {
        let outcome = syncer.sync_if_stale(at(2024, 1, day)).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped, "day {}", day);
    }
    assert_eq!(source.fetch_count().await, 1);

    source.set_records(fixtures::catalog_records(10)).await;
    let outcome = syncer.sync_if_stale(at(2024, 1, 9)).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Refreshed { records: 10, .. }));
    // Each refresh replaces the mirror rather than merging into it.
    assert_eq!(syncer.cache().count_normalized().unwrap(), 10);
}

#[tokio::test]
async fn test_refresh_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let source = MockCatalogSource::new();
    source.set_records(fixtures::catalog_records(3)).await;
    {
        let syncer = create_syncer(&dir, &source);
        syncer.sync_if_stale(at(2024, 5, 1)).await.unwrap();
    }

    let syncer = create_syncer(&dir, &source);
    let outcome = syncer.sync_if_stale(at(2024, 5, 2)).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Skipped);
    assert_eq!(syncer.cache().count_normalized().unwrap(), 3);
}

#[tokio::test]
async fn test_failed_fetch_retries_next_time() {
    let dir = TempDir::new().unwrap();
    let source = MockCatalogSource::new();
    source.set_records(fixtures::catalog_records(2)).await;
    source
        .set_next_error(SourceError::InvalidResponse("truncated body".to_string()))
        .await;
    let syncer = create_syncer(&dir, &source);

    let failed = syncer.sync_if_stale(at(2024, 1, 1)).await;
    assert!(matches!(failed, Err(SyncError::Fetch(_))));
    assert!(syncer.cache().is_empty().unwrap());

    let retried = syncer.sync_if_stale(at(2024, 1, 1)).await.unwrap();
    assert!(matches!(retried, SyncOutcome::Refreshed { records: 2, .. }));
}
