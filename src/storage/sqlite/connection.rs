//! Connection handling for the `SQLite` store.
//!
//! Lock acquisition with poison recovery, pragma setup, and the
//! `BEGIN IMMEDIATE` transaction wrapper used by multi-statement writes.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Busy timeout applied to every connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Acquires the connection lock, recovering from poison.
///
/// A panic inside a previous critical section poisons the mutex. The
/// connection itself is still usable, so the guard is recovered and the
/// event is logged and counted.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("ticketcleaner_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Opens a database file, creating its parent directory if needed.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the directory or the database cannot be
/// created.
pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::storage("create_db_dir", e))?;
    }
    let conn = Connection::open(path).map_err(|e| Error::storage("open_sqlite", e))?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Applies WAL journaling, NORMAL synchronous mode and the busy timeout.
///
/// In-memory databases keep their `memory` journal mode. A journal mode the
/// database refuses is logged and tolerated.
///
/// # Errors
///
/// Returns [`Error::Storage`] if `synchronous` or `busy_timeout` cannot be
/// set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0)) {
        Ok(mode) if !mode.eq_ignore_ascii_case("wal") => {
            tracing::debug!(mode = %mode, "SQLite kept non-WAL journal mode");
        },
        Ok(_) => {},
        Err(e) => tracing::warn!(error = %e, "Failed to enable WAL journal mode"),
    }
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| Error::storage("configure_synchronous", e))?;
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::storage("configure_busy_timeout", e))?;
    Ok(())
}

/// Runs `body` inside a `BEGIN IMMEDIATE` transaction.
///
/// Commits when `body` succeeds, rolls back otherwise. The write lock is taken
/// up front so a concurrent writer waits on the busy timeout instead of
/// failing mid-way.
///
/// # Errors
///
/// Returns the error of `body`, or [`Error::Storage`] if the transaction
/// cannot be started or committed.
pub fn with_transaction<T>(conn: &Connection, body: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    conn.execute("BEGIN IMMEDIATE", [])
        .map_err(|e| Error::storage("begin_transaction", e))?;

    let result = body(conn);

    if result.is_ok() {
        if let Err(e) = conn.execute("COMMIT", []) {
            let _ = conn.execute("ROLLBACK", []);
            return Err(Error::storage("commit_transaction", e));
        }
    } else {
        let _ = conn.execute("ROLLBACK", []);
    }

    result
}

/// Returns true if a table named `table` exists.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the catalog cannot be queried.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| Error::storage("table_exists", e))
}
