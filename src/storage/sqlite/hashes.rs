//! [`HashStore`] and [`BlacklistSource`] for [`SqliteStore`].

use std::collections::HashSet;
use std::time::Instant;

use rusqlite::{OptionalExtension, params};
use tracing::{debug, instrument};

use super::connection::{table_exists, with_transaction};
use super::metrics::record_operation_metrics;
use super::store::SqliteStore;
use crate::models::{HashRecord, Watermark};
use crate::storage::traits::{BlacklistSource, HashStore};
use crate::{Error, Result};

/// Host table holding uploaded documents.
const DOCUMENTS_TABLE: &str = "documents";

impl HashStore for SqliteStore {
    #[instrument(skip(self), fields(operation = "watermark", backend = "sqlite"))]
    fn watermark(&self) -> Result<Option<Watermark>> {
        let start = Instant::now();
        let result = self
            .lock()
            .query_row(
                "SELECT lastupdate FROM picture_hashes_watermark WHERE id = 1",
                [],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(|stamp| stamp.flatten().map(Watermark::new))
            .map_err(|e| Error::storage("read_watermark", e));
        record_operation_metrics("watermark", start, &result);
        result
    }

    #[instrument(
        skip(self, records),
        fields(operation = "replace_all", backend = "sqlite", records = records.len(), watermark = %watermark)
    )]
    fn replace_all(&self, records: &[HashRecord], watermark: &Watermark) -> Result<()> {
        let start = Instant::now();
        let conn = self.lock();
        let result = with_transaction(&conn, |conn| {
            conn.execute("DELETE FROM picture_hashes", [])
                .map_err(|e| Error::storage("clear_hashes", e))?;

            let mut insert = conn
                .prepare("INSERT INTO picture_hashes (hash, filename) VALUES (?1, ?2)")
                .map_err(|e| Error::storage("prepare_insert_hash", e))?;
            for record in records {
                insert
                    .execute(params![record.hash, record.filename])
                    .map_err(|e| {
                        Error::storage("insert_hash", format!("{}: {e}", record.filename))
                    })?;
            }

            conn.execute(
                "INSERT INTO picture_hashes_watermark (id, lastupdate) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET lastupdate = excluded.lastupdate",
                params![watermark.as_str()],
            )
            .map_err(|e| Error::storage("write_watermark", e))?;
            Ok(())
        });
        drop(conn);
        record_operation_metrics("replace_all", start, &result);
        result
    }

    #[instrument(skip(self), fields(operation = "contains", backend = "sqlite"))]
    fn contains(&self, hash: &str) -> Result<bool> {
        let start = Instant::now();
        let result = self
            .lock()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM picture_hashes WHERE hash = ?1)",
                params![hash],
                |row| row.get::<_, bool>(0),
            )
            .map_err(|e| Error::storage("contains_hash", e));
        record_operation_metrics("contains", start, &result);
        result
    }

    #[instrument(skip(self), fields(operation = "all_hashes", backend = "sqlite"))]
    fn all_hashes(&self) -> Result<HashSet<String>> {
        let start = Instant::now();
        let result = (|| -> Result<HashSet<String>> {
            let conn = self.lock();
            let mut stmt = conn
                .prepare("SELECT hash FROM picture_hashes")
                .map_err(|e| Error::storage("prepare_all_hashes", e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::storage("all_hashes", e))?;
            let hashes = rows
                .collect::<std::result::Result<HashSet<_>, _>>()
                .map_err(|e| Error::storage("read_hash_row", e))?;
            Ok(hashes)
        })();
        record_operation_metrics("all_hashes", start, &result);
        result
    }

    #[instrument(skip(self), fields(operation = "count", backend = "sqlite"))]
    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let result = self
            .lock()
            .query_row("SELECT COUNT(*) FROM picture_hashes", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::storage("count_hashes", e));
        record_operation_metrics("count", start, &result);
        result
    }
}

impl BlacklistSource for SqliteStore {
    #[instrument(skip(self), fields(operation = "blacklisted_documents", backend = "sqlite"))]
    fn blacklisted_documents(&self) -> Result<Vec<HashRecord>> {
        let start = Instant::now();
        let result = (|| -> Result<Vec<HashRecord>> {
            let conn = self.lock();
            if !table_exists(&conn, DOCUMENTS_TABLE)? {
                debug!("No host documents table, blacklist is empty");
                return Ok(Vec::new());
            }
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT sha1sum, COALESCE(filename, '')
                     FROM documents
                     WHERE is_blacklisted = 1 AND sha1sum IS NOT NULL AND sha1sum <> ''
                     ORDER BY 1, 2",
                )
                .map_err(|e| Error::storage("prepare_blacklist", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(HashRecord::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                    ))
                })
                .map_err(|e| Error::storage("blacklisted_documents", e))?;
            let records = rows
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::storage("read_blacklist_row", e))?;
            Ok(records)
        })();
        record_operation_metrics("blacklisted_documents", start, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGO: &str = "1111111111111111111111111111111111111111";
    const BANNER: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn test_replace_all_and_lookup() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.watermark().unwrap(), None);

        let wm = Watermark::new("20240101120000");
        store
            .replace_all(&[HashRecord::new(LOGO, "logo.png")], &wm)
            .unwrap();

        assert_eq!(store.watermark().unwrap(), Some(wm));
        assert!(store.contains(LOGO).unwrap());
        assert!(!store.contains(BANNER).unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_replace_all_clears_previous_records() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .replace_all(
                &[HashRecord::new(LOGO, "logo.png")],
                &Watermark::new("20240101000000"),
            )
            .unwrap();
        store
            .replace_all(
                &[
                    HashRecord::new(BANNER, "banner.gif"),
                    HashRecord::new(BANNER, "banner-copy.gif"),
                ],
                &Watermark::new("20240102000000"),
            )
            .unwrap();

        let hashes = store.all_hashes().unwrap();
        assert_eq!(hashes.len(), 1);
        assert!(hashes.contains(BANNER));
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(
            store.watermark().unwrap(),
            Some(Watermark::new("20240102000000"))
        );
    }

    #[test]
    fn test_blacklist_without_documents_table() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.blacklisted_documents().unwrap().is_empty());
    }

    #[test]
    fn test_blacklist_distinct_pairs() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .lock()
            .execute_batch(&format!(
                "CREATE TABLE documents (id INTEGER PRIMARY KEY, sha1sum TEXT, filename TEXT, is_blacklisted INTEGER);
                 INSERT INTO documents (sha1sum, filename, is_blacklisted) VALUES
                   ('{LOGO}', 'logo.png', 1),
                   ('{LOGO}', 'logo.png', 1),
                   ('{BANNER}', 'banner.gif', 0),
                   (NULL, 'broken.png', 1);"
            ))
            .unwrap();

        let records = store.blacklisted_documents().unwrap();
        assert_eq!(records, vec![HashRecord::new(LOGO, "logo.png")]);
    }

    #[test]
    fn test_hash_store_after_uninstall_fails() {
        let store = SqliteStore::in_memory().unwrap();
        store.uninstall().unwrap();
        assert!(matches!(store.count(), Err(Error::Storage { .. })));
    }
}
