//! Picture hash registry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Format of the directory watermark (`YmdHis`).
pub const WATERMARK_FORMAT: &str = "%Y%m%d%H%M%S";

/// A known nuisance file: its SHA-1 and the file it was computed from.
///
/// Only `hash` takes part in lookups; `filename` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashRecord {
    /// Lowercase hex SHA-1 (40 characters).
    pub hash: String,
    /// Source file name.
    pub filename: String,
}

impl HashRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(hash: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            filename: filename.into(),
        }
    }

    /// Returns true if `hash` looks like a hex SHA-1 digest.
    #[must_use]
    pub fn is_valid_hash(hash: &str) -> bool {
        hash.len() == 40 && hash.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// Directory modification stamp the registry was last built from.
///
/// Fixed-width `YmdHis` text, so lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// Wraps an already formatted stamp.
    #[must_use]
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    /// Formats a modification time in UTC.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let utc: DateTime<Utc> = time.into();
        Self(utc.format(WATERMARK_FORMAT).to_string())
    }

    /// Returns the stamp text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `self` is strictly newer than `stored`.
    ///
    /// A missing stored watermark is always older.
    #[must_use]
    pub fn is_newer_than(&self, stored: Option<&Self>) -> bool {
        stored.is_none_or(|s| self > s)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the registry for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    /// Number of stored hash records.
    pub records: usize,
    /// Current watermark, if the registry was ever populated.
    pub watermark: Option<Watermark>,
}
