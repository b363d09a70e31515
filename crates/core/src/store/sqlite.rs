//! SQLite-backed record store.

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{CacheRecord, Page};
use crate::db::Database;
use crate::error::{ReadError, WriteError};
use crate::metrics;

/// Bulk access to one store of a [`Database`].
pub struct RecordStore<T> {
    db: Arc<Database>,
    store: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            store: self.store,
            _record: PhantomData,
        }
    }
}

/// SQLite reports a dropped or never-created table this way.
fn is_missing_store(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table"))
}

/// Delete every row of `store` on `conn`. A missing store has nothing to clear.
pub(crate) fn clear_store(conn: &Connection, store: &str) -> rusqlite::Result<usize> {
    match conn.execute(&format!("DELETE FROM \"{}\"", store), []) {
        Err(e) if is_missing_store(&e) => Ok(0),
        other => other,
    }
}

impl<T: CacheRecord> RecordStore<T> {
    pub fn new(db: Arc<Database>, store: &'static str) -> Self {
        Self {
            db,
            store,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.store
    }

    fn record_read(&self, op: &str, ok: bool) {
        metrics::STORE_READS
            .with_label_values(&[self.store, op, if ok { "ok" } else { "failed" }])
            .inc();
    }

    fn decode(data: &str) -> Result<T, ReadError> {
        serde_json::from_str(data).map_err(|e| ReadError::Deserialization(e.to_string()))
    }

    /// Clear the store, then upsert every record by primary key.
    ///
    /// Runs in one transaction. A failed put does not stop the batch: the
    /// remaining records are still written and the transaction commits, then
    /// the first failure is returned. Treat an error as "contents unknown"
    /// and re-run the whole batch.
    pub fn replace_all(&self, records: &[T]) -> Result<(), WriteError> {
        let result = self.replace_all_inner(records);
        let label = if result.is_ok() { "ok" } else { "failed" };
        metrics::STORE_WRITES
            .with_label_values(&[self.store, label])
            .inc();
        result
    }

    fn replace_all_inner(&self, records: &[T]) -> Result<(), WriteError> {
        let mut conn = self.db.conn();
        let tx = conn
            .transaction()
            .map_err(|e| WriteError::Database(e.to_string()))?;

        tx.execute(&format!("DELETE FROM \"{}\"", self.store), [])
            .map_err(|e| WriteError::Database(e.to_string()))?;

        let mut first_failure = None;
        let mut written = 0u64;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR REPLACE INTO \"{}\" (id, data) VALUES (?, ?)",
                    self.store
                ))
                .map_err(|e| WriteError::Database(e.to_string()))?;

            for record in records {
                let id = record.record_id();
                let result = if id.is_empty() {
                    Err("record id is empty".to_string())
                } else {
                    serde_json::to_string(record)
                        .map_err(|e| e.to_string())
                        .and_then(|data| {
                            stmt.execute(params![id, data])
                                .map(|_| ())
                                .map_err(|e| e.to_string())
                        })
                };

                match result {
                    Ok(()) => written += 1,
                    Err(message) => {
                        warn!(store = self.store, id, %message, "Failed to put record");
                        if first_failure.is_none() {
                            first_failure = Some(WriteError::Put {
                                id: id.to_string(),
                                message,
                            });
                        }
                    }
                }
            }
        }

        tx.commit()
            .map_err(|e| WriteError::Database(e.to_string()))?;

        metrics::RECORDS_WRITTEN
            .with_label_values(&[self.store])
            .inc_by(written);
        debug!(store = self.store, requested = records.len(), written, "Replaced store contents");

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Upsert a single record.
    pub fn put(&self, record: &T) -> Result<(), WriteError> {
        let id = record.record_id();
        let data =
            serde_json::to_string(record).map_err(|e| WriteError::Serialization(e.to_string()))?;
        self.db
            .conn()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO \"{}\" (id, data) VALUES (?, ?)",
                    self.store
                ),
                params![id, data],
            )
            .map_err(|e| WriteError::Put {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Fetch one record by primary key.
    pub fn get(&self, id: &str) -> Result<Option<T>, ReadError> {
        let conn = self.db.conn();
        let data: Option<String> = match conn
            .query_row(
                &format!("SELECT data FROM \"{}\" WHERE id = ?", self.store),
                params![id],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(data) => data,
            Err(e) if is_missing_store(&e) => None,
            Err(e) => {
                self.record_read("get", false);
                return Err(ReadError::Database(e.to_string()));
            }
        };
        self.record_read("get", true);
        data.as_deref().map(Self::decode).transpose()
    }

    /// Remove one record. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool, WriteError> {
        let removed = self
            .db
            .conn()
            .execute(
                &format!("DELETE FROM \"{}\" WHERE id = ?", self.store),
                params![id],
            );
        match removed {
            Ok(rows) => Ok(rows > 0),
            Err(e) if is_missing_store(&e) => Ok(false),
            Err(e) => Err(WriteError::Database(e.to_string())),
        }
    }

    /// Every record, in primary key order. A missing store reads as empty.
    pub fn get_all(&self) -> Result<Vec<T>, ReadError> {
        let result = select_window(&self.db.conn(), self.store, None);
        self.record_read("get_all", result.is_ok());
        result
    }

    /// Total number of records. A missing store counts as zero.
    pub fn count(&self) -> Result<u64, ReadError> {
        let result = count_rows(&self.db.conn(), self.store);
        self.record_read("count", result.is_ok());
        result
    }

    /// Records `offset..offset + limit` in cursor order, with the full count.
    ///
    /// The count and the window are read under one lock, so `total` and
    /// `has_more` always describe the returned records.
    pub fn paginate(&self, offset: u64, limit: u64) -> Result<Page<T>, ReadError> {
        if limit == 0 {
            return Err(ReadError::InvalidPage("limit must be at least 1".to_string()));
        }

        let conn = self.db.conn();
        let total = count_rows(&conn, self.store);
        self.record_read("count", total.is_ok());
        let total = total?;
        if offset >= total {
            return Ok(Page::empty(total));
        }

        let records = select_window(&conn, self.store, Some((offset, limit)));
        drop(conn);
        self.record_read("paginate", records.is_ok());
        let records = records?;
        let has_more = offset + (records.len() as u64) < total;

        Ok(Page {
            records,
            has_more,
            total,
        })
    }

    /// Remove every record. The store itself stays.
    pub fn clear(&self) -> Result<(), WriteError> {
        let removed = clear_store(&self.db.conn(), self.store)
            .map_err(|e| WriteError::Database(e.to_string()))?;
        debug!(store = self.store, removed, "Cleared store");
        Ok(())
    }
}

fn count_rows(conn: &Connection, store: &str) -> Result<u64, ReadError> {
    match conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{}\"", store),
        [],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(count) => Ok(count as u64),
        Err(e) if is_missing_store(&e) => Ok(0),
        Err(e) => Err(ReadError::Database(e.to_string())),
    }
}

/// SQLite integers are signed; anything larger means "no bound".
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn read_data(row: &rusqlite::Row<'_>) -> rusqlite::Result<String> {
    row.get(0)
}

fn select_window<T: CacheRecord>(
    conn: &Connection,
    store: &str,
    window: Option<(u64, u64)>,
) -> Result<Vec<T>, ReadError> {
    let mut sql = format!("SELECT data FROM \"{}\" ORDER BY id", store);
    if window.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }

    let mut stmt = match conn.prepare(&sql) {
        Ok(stmt) => stmt,
        Err(e) if is_missing_store(&e) => return Ok(Vec::new()),
        Err(e) => return Err(ReadError::Database(e.to_string())),
    };

    let rows = match window {
        Some((offset, limit)) => {
            stmt.query_map(params![to_sql_int(limit), to_sql_int(offset)], read_data)
        }
        None => stmt.query_map([], read_data),
    }
    .map_err(|e| ReadError::Database(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        let data = row.map_err(|e| ReadError::Database(e.to_string()))?;
        records.push(RecordStore::<T>::decode(&data)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::schema::{SCHEMA_VERSION, STORE_STAMPS};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl CacheRecord for Note {
        fn record_id(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn create_test_store() -> RecordStore<Note> {
        let db = Arc::new(Database::in_memory(SCHEMA_VERSION).unwrap());
        RecordStore::new(db, STORE_STAMPS)
    }

    fn notes(n: usize) -> Vec<Note> {
        (0..n)
            .map(|i| note(&format!("n{:03}", i), &format!("note {}", i)))
            .collect()
    }

    #[test]
    fn test_replace_all_and_get_all() {
        let store = create_test_store();
        store.replace_all(&notes(3)).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_replace_all_discards_previous_contents() {
        let store = create_test_store();
        store.replace_all(&notes(5)).unwrap();
        store.replace_all(&[note("fresh", "only one")]).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all, vec![note("fresh", "only one")]);
    }

    #[test]
    fn test_duplicate_ids_in_batch_collapse() {
        let store = create_test_store();
        let record = note("dup", "first");

        store.replace_all(&[record.clone(), record]).unwrap();

        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let store = create_test_store();
        store
            .replace_all(&[note("dup", "first"), note("dup", "second")])
            .unwrap();

        assert_eq!(store.get("dup").unwrap().unwrap().text, "second");
    }

    #[test]
    fn test_failed_put_still_writes_the_rest() {
        let store = create_test_store();
        let batch = vec![note("a", "ok"), note("", "bad"), note("c", "ok")];

        let result = store.replace_all(&batch);

        assert!(matches!(result, Err(WriteError::Put { .. })));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_paginate_windows() {
        let store = create_test_store();
        store.replace_all(&notes(5)).unwrap();

        let first = store.paginate(0, 2).unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.total, 5);

        let last = store.paginate(4, 2).unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(!last.has_more);
        assert_eq!(last.total, 5);
    }

    #[test]
    fn test_paginate_exact_boundary_has_no_more() {
        let store = create_test_store();
        store.replace_all(&notes(4)).unwrap();

        let page = store.paginate(2, 2).unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(!page.has_more);
    }

    #[test]
    fn test_paginate_past_end() {
        let store = create_test_store();
        store.replace_all(&notes(3)).unwrap();

        for offset in [3, 4, 100] {
            let page = store.paginate(offset, 10).unwrap();
            assert_eq!(page, Page::empty(3));
        }
    }

    #[test]
    fn test_paginate_rejects_zero_limit() {
        let store = create_test_store();
        assert!(matches!(
            store.paginate(0, 0),
            Err(ReadError::InvalidPage(_))
        ));
    }

    #[test]
    fn test_pages_cover_all_records_once() {
        let store = create_test_store();
        store.replace_all(&notes(23)).unwrap();
        let expected: BTreeSet<String> =
            store.get_all().unwrap().into_iter().map(|n| n.id).collect();

        for limit in [1, 2, 5, 7, 23, 50] {
            let mut seen = Vec::new();
            let mut offset = 0;
            loop {
                let page = store.paginate(offset, limit).unwrap();
                seen.extend(page.records.iter().map(|n| n.id.clone()));
                if !page.has_more {
                    break;
                }
                offset += limit;
            }
            let unique: BTreeSet<String> = seen.iter().cloned().collect();
            assert_eq!(seen.len(), unique.len(), "duplicates with limit {}", limit);
            assert_eq!(unique, expected, "mismatch with limit {}", limit);
        }
    }

    #[test]
    fn test_unbounded_limit_returns_everything() {
        let store = create_test_store();
        store.replace_all(&notes(3)).unwrap();

        let page = store.paginate(0, u64::MAX).unwrap();
        assert_eq!(page.records.len(), 3);
        assert!(!page.has_more);
        assert_eq!(page.total, 3);

        let page = store.paginate(1, u64::MAX).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, "n001");
    }

    #[test]
    fn test_page_is_consistent_with_concurrent_writes() {
        let store = create_test_store();
        store.replace_all(&notes(10)).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let n = if i % 2 == 0 { 20 } else { 10 };
                    store.replace_all(&notes(n)).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let page = store.paginate(5, 100).unwrap();
            assert_eq!(page.records.len() as u64, page.total - 5);
            assert!(!page.has_more);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_clear_keeps_store() {
        let store = create_test_store();
        store.replace_all(&notes(3)).unwrap();

        store.clear().unwrap();

        assert_eq!(store.count().unwrap(), 0);
        store.replace_all(&notes(1)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_missing_store_reads_as_empty() {
        let db = Arc::new(Database::in_memory(SCHEMA_VERSION).unwrap());
        let store: RecordStore<Note> = RecordStore::new(db, "never_created");

        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.paginate(0, 5).unwrap(), Page::empty(0));
        assert!(store.get("x").unwrap().is_none());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_replace_all_on_missing_store_fails() {
        let db = Arc::new(Database::in_memory(SCHEMA_VERSION).unwrap());
        let store: RecordStore<Note> = RecordStore::new(db, "never_created");

        assert!(matches!(
            store.replace_all(&notes(1)),
            Err(WriteError::Database(_))
        ));
    }

    #[test]
    fn test_put_get_remove() {
        let store = create_test_store();
        store.put(&note("k", "v1")).unwrap();
        store.put(&note("k", "v2")).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("k").unwrap().unwrap().text, "v2");
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_row_is_a_read_error() {
        let store = create_test_store();
        store
            .db
            .conn()
            .execute("INSERT INTO stamps (id, data) VALUES ('x', '{\"id\": 5}')", [])
            .unwrap();

        assert!(matches!(
            store.get_all(),
            Err(ReadError::Deserialization(_))
        ));
    }
}
