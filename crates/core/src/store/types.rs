//! Types returned by record store reads.

use serde::{Deserialize, Serialize};

/// One window of a store, in cursor order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Whether records exist beyond `offset + limit`.
    pub has_more: bool,
    /// Full store count, independent of the window.
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty(total: u64) -> Self {
        Self {
            records: Vec::new(),
            has_more: false,
            total,
        }
    }
}
