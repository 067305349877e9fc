//! Schema installation, upgrade and removal.
//!
//! Install is idempotent. It creates the hash registry tables, moves a legacy
//! single-column filter table out of the way, and upgrades fixed-width
//! `regex`/`replacement` columns to `TEXT` while keeping the rows.

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use super::connection::{table_exists, with_transaction};
use crate::{Error, Result};

/// Filter table.
pub const FILTERS_TABLE: &str = "filters";
/// Where a legacy filter table is preserved.
pub const BACKUP_FILTERS_TABLE: &str = "backup_filters";
/// Known picture hashes.
pub const HASHES_TABLE: &str = "picture_hashes";
/// Single-row watermark table.
pub const WATERMARK_TABLE: &str = "picture_hashes_watermark";

/// Column that only exists in the legacy filter layout.
const LEGACY_FILTER_COLUMN: &str = "filter";

const HASH_TABLES_DDL: &str = r"
    CREATE TABLE IF NOT EXISTS picture_hashes_watermark (
        id INTEGER PRIMARY KEY,
        lastupdate TEXT NULL
    );

    CREATE TABLE IF NOT EXISTS picture_hashes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash CHAR(40) NOT NULL,
        filename VARCHAR(255) NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_picture_hashes_hash ON picture_hashes(hash);
";

fn filters_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR(255) NOT NULL,
            type INTEGER NOT NULL DEFAULT 1,
            "order" INTEGER NULL,
            regex TEXT NOT NULL,
            replacement TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            comment TEXT NULL,
            modified_at TEXT NULL
        );
        "#
    )
}

const FILTER_INDEXES_DDL: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_filters_type ON filters(type);
    CREATE INDEX IF NOT EXISTS idx_filters_order ON filters("order");
"#;

const FILTER_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "type",
    "order",
    "regex",
    "replacement",
    "is_active",
    "comment",
    "modified_at",
];

/// What [`install`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// A legacy filter table was renamed to [`BACKUP_FILTERS_TABLE`].
    pub legacy_backed_up: bool,
    /// The filter table was rebuilt with `TEXT` pattern columns.
    pub columns_upgraded: bool,
}

/// Column name and declared type, as reported by `PRAGMA table_info`.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| Error::storage("prepare_table_info", e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
        .map_err(|e| Error::storage("table_info", e))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::storage("read_table_info", e))
}

fn declared_type<'a>(columns: &'a [(String, String)], column: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, ty)| ty.as_str())
}

/// Creates or upgrades every table.
///
/// # Errors
///
/// Returns [`Error::Storage`] if any DDL statement fails. Each step runs in
/// its own transaction, so a failure leaves earlier steps applied.
#[instrument(skip(conn), fields(operation = "install", backend = "sqlite"))]
pub fn install(conn: &Connection) -> Result<InstallReport> {
    let mut report = InstallReport::default();

    conn.execute_batch(HASH_TABLES_DDL)
        .map_err(|e| Error::storage("create_hash_tables", e))?;

    if table_exists(conn, FILTERS_TABLE)? {
        let columns = table_columns(conn, FILTERS_TABLE)?;
        if declared_type(&columns, LEGACY_FILTER_COLUMN).is_some() {
            backup_legacy_filters(conn)?;
            report.legacy_backed_up = true;
        } else if needs_text_upgrade(&columns) {
            rebuild_filters(conn, &columns)?;
            report.columns_upgraded = true;
        }
    }

    conn.execute_batch(&filters_ddl(FILTERS_TABLE))
        .map_err(|e| Error::storage("create_filters", e))?;
    conn.execute_batch(FILTER_INDEXES_DDL)
        .map_err(|e| Error::storage("create_filter_indexes", e))?;

    info!(
        legacy_backed_up = report.legacy_backed_up,
        columns_upgraded = report.columns_upgraded,
        "Schema installed"
    );
    Ok(report)
}

/// Drops the hash registry tables. Filters are kept.
///
/// # Errors
///
/// Returns [`Error::Storage`] if a drop fails.
#[instrument(skip(conn), fields(operation = "uninstall", backend = "sqlite"))]
pub fn uninstall(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {HASHES_TABLE}; DROP TABLE IF EXISTS {WATERMARK_TABLE};"
    ))
    .map_err(|e| Error::storage("drop_hash_tables", e))?;
    info!("Hash registry tables dropped");
    Ok(())
}

fn needs_text_upgrade(columns: &[(String, String)]) -> bool {
    ["regex", "replacement"].iter().any(|column| {
        declared_type(columns, column).is_some_and(|ty| !ty.eq_ignore_ascii_case("TEXT"))
    })
}

fn backup_legacy_filters(conn: &Connection) -> Result<()> {
    with_transaction(conn, |conn| {
        if table_exists(conn, BACKUP_FILTERS_TABLE)? {
            warn!(table = BACKUP_FILTERS_TABLE, "Dropping previous filter backup");
            conn.execute_batch(&format!("DROP TABLE {BACKUP_FILTERS_TABLE}"))
                .map_err(|e| Error::storage("drop_filter_backup", e))?;
        }
        conn.execute_batch(&format!(
            "ALTER TABLE {FILTERS_TABLE} RENAME TO {BACKUP_FILTERS_TABLE};
             DROP INDEX IF EXISTS idx_filters_type;
             DROP INDEX IF EXISTS idx_filters_order;"
        ))
        .map_err(|e| Error::storage("backup_legacy_filters", e))?;
        Ok(())
    })?;
    warn!(
        table = BACKUP_FILTERS_TABLE,
        "Legacy filter table preserved as backup; filters must be recreated"
    );
    Ok(())
}

fn rebuild_filters(conn: &Connection, columns: &[(String, String)]) -> Result<()> {
    let shared: Vec<String> = FILTER_COLUMNS
        .iter()
        .filter(|c| declared_type(columns, c).is_some())
        .map(|c| format!("\"{c}\""))
        .collect();
    let column_list = shared.join(", ");

    with_transaction(conn, |conn| {
        conn.execute_batch(&format!(
            "{create}
             INSERT INTO filters_upgrade ({column_list}) SELECT {column_list} FROM {FILTERS_TABLE};
             DROP TABLE {FILTERS_TABLE};
             ALTER TABLE filters_upgrade RENAME TO {FILTERS_TABLE};",
            create = filters_ddl("filters_upgrade"),
        ))
        .map_err(|e| Error::storage("upgrade_filter_columns", e))
    })?;
    info!("Filter regex and replacement columns upgraded to TEXT");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_install_creates_tables() {
        let conn = memory_conn();
        let report = install(&conn).unwrap();
        assert_eq!(report, InstallReport::default());
        for table in [FILTERS_TABLE, HASHES_TABLE, WATERMARK_TABLE] {
            assert!(table_exists(&conn, table).unwrap(), "{table} missing");
        }
    }

    #[test]
    fn test_install_is_idempotent() {
        let conn = memory_conn();
        install(&conn).unwrap();
        conn.execute(
            "INSERT INTO filters (name, type, regex, replacement, is_active) VALUES ('a', 2, '/x/', '', 1)",
            [],
        )
        .unwrap();
        install(&conn).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM filters", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_install_backs_up_legacy_table() {
        let conn = memory_conn();
        conn.execute_batch(
            "CREATE TABLE filters (id INTEGER PRIMARY KEY, filter TEXT);
             INSERT INTO filters (filter) VALUES ('old');
             CREATE TABLE backup_filters (id INTEGER);",
        )
        .unwrap();

        let report = install(&conn).unwrap();
        assert!(report.legacy_backed_up);

        let old: String = conn
            .query_row("SELECT filter FROM backup_filters", [], |r| r.get(0))
            .unwrap();
        assert_eq!(old, "old");
        let columns = table_columns(&conn, FILTERS_TABLE).unwrap();
        assert!(declared_type(&columns, "filter").is_none());
        assert!(declared_type(&columns, "regex").is_some());
    }

    #[test]
    fn test_install_upgrades_varchar_columns() {
        let conn = memory_conn();
        conn.execute_batch(
            r#"CREATE TABLE filters (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 name VARCHAR(255) NOT NULL,
                 type INTEGER NOT NULL,
                 "order" INTEGER,
                 regex VARCHAR(255) NOT NULL,
                 replacement VARCHAR(255) NOT NULL,
                 is_active INTEGER NOT NULL
               );
               INSERT INTO filters (name, type, "order", regex, replacement, is_active)
               VALUES ('sig', 2, 1, '/x/', 'y', 1);"#,
        )
        .unwrap();

        let report = install(&conn).unwrap();
        assert!(report.columns_upgraded);

        let columns = table_columns(&conn, FILTERS_TABLE).unwrap();
        assert_eq!(declared_type(&columns, "regex"), Some("TEXT"));
        assert_eq!(declared_type(&columns, "replacement"), Some("TEXT"));
        let (name, regex): (String, String) = conn
            .query_row("SELECT name, regex FROM filters", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "sig");
        assert_eq!(regex, "/x/");
    }

    #[test]
    fn test_uninstall_keeps_filters() {
        let conn = memory_conn();
        install(&conn).unwrap();
        uninstall(&conn).unwrap();
        assert!(table_exists(&conn, FILTERS_TABLE).unwrap());
        assert!(!table_exists(&conn, HASHES_TABLE).unwrap());
        assert!(!table_exists(&conn, WATERMARK_TABLE).unwrap());
        // dropping twice is fine
        uninstall(&conn).unwrap();
    }
}
