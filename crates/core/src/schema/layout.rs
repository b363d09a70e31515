//! Declared shape of the cache database at each schema version.

/// Current database schema version.
pub const SCHEMA_VERSION: u32 = 6;

/// Database name. File-backed caches default to `<DATABASE_NAME>.db`.
pub const DATABASE_NAME: &str = "stamp-catalog-cache";

/// Normalized catalog records.
pub const STORE_STAMPS: &str = "stamps";
/// Raw catalog items as projected from the remote payload.
pub const STORE_RAW_ITEMS: &str = "raw_catalog_items";
/// Refresh bookkeeping, one row per key.
pub const STORE_METADATA: &str = "metadata";

/// A secondary lookup path on a JSON field of the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Physical index name. Index names are database-wide in SQLite,
    /// so they carry the store name.
    pub name: String,
    /// Record field the index is built on.
    pub key_path: &'static str,
    pub unique: bool,
}

/// One logical store and the indexes it should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    pub name: &'static str,
    /// Record field that is the primary key.
    pub key_path: &'static str,
    pub indexes: Vec<IndexSpec>,
}

impl StoreSpec {
    /// Whether `index` belongs to the used index set of this store.
    pub fn uses_index(&self, index: &str) -> bool {
        self.indexes.iter().any(|spec| spec.name == index)
    }
}

struct IndexDecl {
    store: &'static str,
    key_path: &'static str,
    unique: bool,
    since: u32,
}

struct StoreDecl {
    name: &'static str,
    key_path: &'static str,
    since: u32,
}

const STORES: &[StoreDecl] = &[
    StoreDecl {
        name: STORE_STAMPS,
        key_path: "id",
        since: 1,
    },
    StoreDecl {
        name: STORE_RAW_ITEMS,
        key_path: "id",
        since: 2,
    },
    StoreDecl {
        name: STORE_METADATA,
        key_path: "key",
        since: 5,
    },
];

const INDEXES: &[IndexDecl] = &[
    IndexDecl {
        store: STORE_STAMPS,
        key_path: "country",
        unique: false,
        since: 1,
    },
    IndexDecl {
        store: STORE_STAMPS,
        key_path: "seriesName",
        unique: false,
        since: 1,
    },
    IndexDecl {
        store: STORE_STAMPS,
        key_path: "issueYear",
        unique: false,
        since: 3,
    },
    IndexDecl {
        store: STORE_RAW_ITEMS,
        key_path: "country",
        unique: false,
        since: 2,
    },
    IndexDecl {
        store: STORE_RAW_ITEMS,
        key_path: "seriesName",
        unique: false,
        since: 2,
    },
    IndexDecl {
        store: STORE_RAW_ITEMS,
        key_path: "issueYear",
        unique: false,
        since: 4,
    },
    IndexDecl {
        store: STORE_METADATA,
        key_path: "key",
        unique: true,
        since: 5,
    },
];

/// Physical name of the index on `key_path` in `store`.
pub fn index_name(store: &str, key_path: &str) -> String {
    format!("{}_by_{}", store, key_path)
}

/// Stores and their used index sets at `version`.
///
/// Versions above [`SCHEMA_VERSION`] have the same shape as the current one.
pub fn store_layout(version: u32) -> Vec<StoreSpec> {
    STORES
        .iter()
        .filter(|store| store.since <= version)
        .map(|store| StoreSpec {
            name: store.name,
            key_path: store.key_path,
            indexes: INDEXES
                .iter()
                .filter(|index| index.store == store.name && index.since <= version)
                .map(|index| IndexSpec {
                    name: index_name(store.name, index.key_path),
                    key_path: index.key_path,
                    unique: index.unique,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_paths(store: &StoreSpec) -> Vec<&'static str> {
        store.indexes.iter().map(|i| i.key_path).collect()
    }

    #[test]
    fn test_current_layout_has_three_stores() {
        let layout = store_layout(SCHEMA_VERSION);
        let names: Vec<&str> = layout.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![STORE_STAMPS, STORE_RAW_ITEMS, STORE_METADATA]);
    }

    #[test]
    fn test_current_layout_indexes() {
        let layout = store_layout(SCHEMA_VERSION);
        assert_eq!(key_paths(&layout[0]), vec!["country", "seriesName", "issueYear"]);
        assert_eq!(key_paths(&layout[1]), vec!["country", "seriesName", "issueYear"]);
        assert_eq!(key_paths(&layout[2]), vec!["key"]);
        assert!(layout[2].indexes[0].unique);
        assert_eq!(layout[2].key_path, "key");
    }

    #[test]
    fn test_older_versions_use_fewer_indexes() {
        let layout = store_layout(2);
        assert_eq!(layout.len(), 2);
        assert_eq!(key_paths(&layout[0]), vec!["country", "seriesName"]);
        assert_eq!(key_paths(&layout[1]), vec!["country", "seriesName"]);
    }

    #[test]
    fn test_future_version_matches_current() {
        assert_eq!(store_layout(SCHEMA_VERSION + 3), store_layout(SCHEMA_VERSION));
    }

    #[test]
    fn test_index_names_are_store_qualified() {
        assert_eq!(index_name(STORE_STAMPS, "country"), "stamps_by_country");
        let layout = store_layout(SCHEMA_VERSION);
        assert!(layout[1].uses_index("raw_catalog_items_by_issueYear"));
        assert!(!layout[1].uses_index("stamps_by_issueYear"));
    }
}
