//! `SQLite` store handle.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::instrument;

use super::connection::{acquire_lock, configure_connection, open_connection};
use super::schema::{self, InstallReport};
use crate::{Error, Result};

/// SQLite-backed filter store, hash registry store and blacklist source.
///
/// One connection behind a mutex. The host's own `documents` table is read
/// from the same database when present.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens the database at `path` without touching the schema.
    ///
    /// Call [`Self::install`] once before first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = open_connection(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        })
    }

    /// Creates an installed in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::storage("open_sqlite_memory", e))?;
        configure_connection(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.install()?;
        Ok(store)
    }

    /// Returns the database path (`None` for in-memory stores).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Creates or upgrades the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a DDL statement fails.
    #[instrument(skip(self), fields(db_path = ?self.db_path))]
    pub fn install(&self) -> Result<InstallReport> {
        schema::install(&self.lock())
    }

    /// Drops the hash registry tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a drop fails.
    #[instrument(skip(self), fields(db_path = ?self.db_path))]
    pub fn uninstall(&self) -> Result<()> {
        schema::uninstall(&self.lock())
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, Connection> {
        acquire_lock(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaner.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));

        let conn = store.lock();
        assert!(!super::super::connection::table_exists(&conn, schema::FILTERS_TABLE).unwrap());
    }

    #[test]
    fn test_in_memory_is_installed() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.db_path().is_none());
        let conn = store.lock();
        assert!(super::super::connection::table_exists(&conn, schema::HASHES_TABLE).unwrap());
    }
}
