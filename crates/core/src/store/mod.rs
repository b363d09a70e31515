//! Generic bulk I/O against one logical store.

mod sqlite;
mod types;

pub(crate) use sqlite::clear_store;
pub use sqlite::RecordStore;
pub use types::*;

use serde::{de::DeserializeOwned, Serialize};

/// A record that can live in a store, keyed by a string primary key.
pub trait CacheRecord: Serialize + DeserializeOwned {
    /// Primary key. Writing a record with an existing key replaces it.
    fn record_id(&self) -> &str;
}
