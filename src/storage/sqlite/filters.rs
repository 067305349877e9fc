//! [`FilterStore`] for [`SqliteStore`].

use std::time::Instant;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, Row, params};
use tracing::{debug, instrument, warn};

use super::metrics::record_operation_metrics;
use super::store::SqliteStore;
use crate::models::{Filter, FilterSet, FilterType, NewFilter, decode_entities, encode_entities};
use crate::storage::traits::FilterStore;
use crate::{Error, Result};

const MODIFIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_FILTERS: &str = r#"
    SELECT id, name, type, "order", regex, replacement, is_active, comment, modified_at
    FROM filters"#;

/// Raw row, before type code and entity decoding.
struct FilterRow {
    id: i64,
    name: String,
    type_code: i64,
    order: Option<i64>,
    regex: String,
    replacement: String,
    is_active: i64,
    comment: Option<String>,
    modified_at: Option<String>,
}

impl FilterRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            type_code: row.get(2)?,
            order: row.get(3)?,
            regex: row.get(4)?,
            replacement: row.get(5)?,
            is_active: row.get(6)?,
            comment: row.get(7)?,
            modified_at: row.get(8)?,
        })
    }

    /// Decodes the row; rows with an unknown type code are dropped.
    fn into_filter(self) -> Option<Filter> {
        let Some(filter_type) = FilterType::from_code(self.type_code) else {
            warn!(
                filter_id = self.id,
                type_code = self.type_code,
                "Ignoring filter with unknown type"
            );
            return None;
        };
        Some(Filter {
            id: self.id,
            name: self.name,
            filter_type,
            order: self.order,
            regex: decode_entities(&self.regex),
            replacement: decode_entities(&self.replacement),
            is_active: self.is_active != 0,
            comment: self.comment,
            modified_at: self
                .modified_at
                .and_then(|s| NaiveDateTime::parse_from_str(&s, MODIFIED_AT_FORMAT).ok()),
        })
    }
}

fn query_filters(conn: &Connection, where_clause: &str) -> Result<Vec<Filter>> {
    let sql = format!(r#"{SELECT_FILTERS} {where_clause} ORDER BY type, "order", id"#);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::storage("prepare_load_filters", e))?;
    let rows = stmt
        .query_map([], FilterRow::from_row)
        .map_err(|e| Error::storage("load_filters", e))?;

    let mut filters = Vec::new();
    for row in rows {
        let row = row.map_err(|e| Error::storage("read_filter_row", e))?;
        if let Some(filter) = row.into_filter() {
            filters.push(filter);
        }
    }
    Ok(filters)
}

impl FilterStore for SqliteStore {
    #[instrument(skip(self), fields(operation = "load_active_filters", backend = "sqlite"))]
    fn load_active_filters(&self) -> Result<FilterSet> {
        let start = Instant::now();
        let result = query_filters(&self.lock(), "WHERE is_active = 1").map(|filters| {
            debug!(count = filters.len(), "Loaded active filters");
            FilterSet::from_filters(filters)
        });
        record_operation_metrics("load_active_filters", start, &result);
        result
    }

    #[instrument(skip(self), fields(operation = "list_filters", backend = "sqlite"))]
    fn list_filters(&self) -> Result<Vec<Filter>> {
        let start = Instant::now();
        let result = query_filters(&self.lock(), "");
        record_operation_metrics("list_filters", start, &result);
        result
    }

    #[instrument(
        skip(self, filter),
        fields(operation = "insert_filter", backend = "sqlite", filter_type = %filter.filter_type)
    )]
    fn insert_filter(&self, filter: &NewFilter) -> Result<Filter> {
        let start = Instant::now();
        let result = (|| -> Result<Filter> {
            let conn = self.lock();
            let modified_at = Utc::now().naive_utc().format(MODIFIED_AT_FORMAT).to_string();
            conn.execute(
                r#"INSERT INTO filters
                   (name, type, "order", regex, replacement, is_active, comment, modified_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    filter.name,
                    filter.filter_type.code(),
                    filter.order,
                    encode_entities(&filter.regex),
                    encode_entities(&filter.replacement),
                    i64::from(filter.is_active),
                    filter.comment,
                    modified_at,
                ],
            )
            .map_err(|e| Error::storage("insert_filter", e))?;

            Ok(Filter {
                id: conn.last_insert_rowid(),
                name: filter.name.clone(),
                filter_type: filter.filter_type,
                order: filter.order,
                regex: filter.regex.clone(),
                replacement: filter.replacement.clone(),
                is_active: filter.is_active,
                comment: filter.comment.clone(),
                modified_at: NaiveDateTime::parse_from_str(&modified_at, MODIFIED_AT_FORMAT).ok(),
            })
        })();
        record_operation_metrics("insert_filter", start, &result);
        result
    }

    #[instrument(skip(self), fields(operation = "set_active", backend = "sqlite"))]
    fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let start = Instant::now();
        let result = self
            .lock()
            .execute(
                "UPDATE filters SET is_active = ?1, modified_at = ?2 WHERE id = ?3",
                params![
                    i64::from(active),
                    Utc::now().naive_utc().format(MODIFIED_AT_FORMAT).to_string(),
                    id
                ],
            )
            .map(|updated| updated > 0)
            .map_err(|e| Error::storage("set_active", e));
        record_operation_metrics("set_active", start, &result);
        result
    }
}
