use serde::{Deserialize, Serialize};

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Records in the normalized store.
    pub normalized_records: u64,
    /// Items in the raw store.
    pub raw_items: u64,
    /// Last successful refresh (`YYYY-MM-DD`), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh_date: Option<String>,
    pub schema_version: u32,
}
