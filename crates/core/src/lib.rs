//! Local mirror of a remote stamp catalog.
//!
//! A versioned SQLite database holds normalized stamp records, raw catalog
//! items and refresh metadata. [`CatalogCache`] is the entry point: bulk
//! save/load, pagination, clearing, and the staleness check that tells a
//! caller when to re-fetch.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod refresh;
pub mod schema;
pub mod store;
pub mod sync;
pub mod testing;

pub use cache::{CacheStats, CatalogCache, DEFAULT_STALE_AFTER_DAYS};
pub use catalog::{project_raw_items, CatalogRecord, MarketValues, RawCatalogItem};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, DatabaseConfig, RefreshConfig,
};
pub use db::{Database, DatabaseLocation};
pub use error::{CacheError, MetadataError, OpenError, ReadError, WriteError};
pub use refresh::{Freshness, MetadataEntry, MetadataErrorCallback, RefreshPolicy};
pub use schema::{MigrationReport, DATABASE_NAME, SCHEMA_VERSION};
pub use store::{CacheRecord, Page, RecordStore};
pub use sync::{CacheSyncer, CatalogSource, SourceError, SyncError, SyncOutcome};
