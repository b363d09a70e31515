//! SQLite implementation of the schema backend.
//!
//! A store is a table `(id TEXT PRIMARY KEY, data TEXT)` holding one JSON
//! document per record. An index on key path `k` is an expression index on
//! `json_extract(data, '$.k')`.

use rusqlite::{params, Connection, OptionalExtension};

use super::layout::{IndexSpec, StoreSpec};
use super::migration::SchemaBackend;

/// Schema backend over a borrowed connection.
pub struct SqliteSchema<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSchema<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SchemaBackend for SqliteSchema<'_> {
    fn store_exists(&self, store: &str) -> Result<bool, String> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                params![store],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| e.to_string())
    }

    fn create_store(&self, store: &StoreSpec) -> Result<(), String> {
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    id TEXT PRIMARY KEY NOT NULL,
                    data TEXT NOT NULL
                )",
                store.name
            ))
            .map_err(|e| e.to_string())
    }

    fn index_names(&self, store: &str) -> Result<Vec<String>, String> {
        // Automatic indexes (primary key, UNIQUE columns) have no SQL and are
        // not ours to manage.
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL
                 ORDER BY name",
            )
            .map_err(|e| e.to_string())?;

        let rows = stmt
            .query_map(params![store], |row| row.get::<_, String>(0))
            .map_err(|e| e.to_string())?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(|e| e.to_string())?);
        }
        Ok(names)
    }

    fn drop_index(&self, _store: &str, index: &str) -> Result<(), String> {
        self.conn
            .execute_batch(&format!("DROP INDEX IF EXISTS \"{}\"", index))
            .map_err(|e| e.to_string())
    }

    fn create_index(&self, store: &str, index: &IndexSpec) -> Result<(), String> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        self.conn
            .execute_batch(&format!(
                "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{}\"(json_extract(data, '$.{}'))",
                unique, index.name, store, index.key_path
            ))
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::layout::{store_layout, SCHEMA_VERSION};

    fn stamps_spec() -> StoreSpec {
        store_layout(SCHEMA_VERSION).remove(0)
    }

    #[test]
    fn test_create_store_and_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SqliteSchema::new(&conn);
        let spec = stamps_spec();

        assert!(!schema.store_exists("stamps").unwrap());
        schema.create_store(&spec).unwrap();
        assert!(schema.store_exists("stamps").unwrap());

        for index in &spec.indexes {
            schema.create_index(spec.name, index).unwrap();
        }
        assert_eq!(
            schema.index_names("stamps").unwrap(),
            vec![
                "stamps_by_country".to_string(),
                "stamps_by_issueYear".to_string(),
                "stamps_by_seriesName".to_string(),
            ]
        );
    }

    #[test]
    fn test_drop_index_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SqliteSchema::new(&conn);
        let spec = stamps_spec();
        schema.create_store(&spec).unwrap();
        schema.create_index(spec.name, &spec.indexes[0]).unwrap();
        conn.execute(
            "INSERT INTO stamps (id, data) VALUES ('s1', '{\"id\":\"s1\",\"country\":\"Peru\"}')",
            [],
        )
        .unwrap();

        schema.drop_index(spec.name, "stamps_by_country").unwrap();

        assert!(schema.index_names("stamps").unwrap().is_empty());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stamps", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unique_index_rejects_duplicate_keys() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SqliteSchema::new(&conn);
        let spec = store_layout(SCHEMA_VERSION).remove(2);
        schema.create_store(&spec).unwrap();
        schema.create_index(spec.name, &spec.indexes[0]).unwrap();

        conn.execute(
            "INSERT INTO metadata (id, data) VALUES ('a', '{\"key\":\"same\"}')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO metadata (id, data) VALUES ('b', '{\"key\":\"same\"}')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_index_names_on_missing_store_is_empty() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SqliteSchema::new(&conn);
        assert!(schema.index_names("nothing").unwrap().is_empty());
    }
}
