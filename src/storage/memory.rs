//! In-memory storage backend.
//!
//! Keeps filters, hash records and the blacklist behind one mutex each. Used
//! in tests and for dry runs where no database is available.

use std::collections::HashSet;
use std::sync::Mutex;

use super::sqlite::acquire_lock;
use super::traits::{BlacklistSource, FilterStore, HashStore};
use crate::Result;
use crate::models::{Filter, FilterSet, HashRecord, NewFilter, Watermark};

#[derive(Debug, Default)]
struct HashState {
    records: Vec<HashRecord>,
    watermark: Option<Watermark>,
}

/// Process-local store implementing every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    filters: Mutex<Vec<Filter>>,
    hashes: Mutex<HashState>,
    blacklist: Mutex<Vec<HashRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with filters (ids are kept as given).
    #[must_use]
    pub fn with_filters(filters: impl IntoIterator<Item = Filter>) -> Self {
        let store = Self::new();
        acquire_lock(&store.filters).extend(filters);
        store
    }

    /// Adds a blacklisted document pair.
    pub fn add_blacklisted(&self, record: HashRecord) {
        acquire_lock(&self.blacklist).push(record);
    }
}

impl FilterStore for MemoryStore {
    fn load_active_filters(&self) -> Result<FilterSet> {
        Ok(FilterSet::from_filters(acquire_lock(&self.filters).clone()))
    }

    fn list_filters(&self) -> Result<Vec<Filter>> {
        let mut filters = acquire_lock(&self.filters).clone();
        filters.sort_by_key(Filter::sort_key);
        Ok(filters)
    }

    fn insert_filter(&self, filter: &NewFilter) -> Result<Filter> {
        let mut filters = acquire_lock(&self.filters);
        let id = filters.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        let stored = Filter {
            id,
            name: filter.name.clone(),
            filter_type: filter.filter_type,
            order: filter.order,
            regex: filter.regex.clone(),
            replacement: filter.replacement.clone(),
            is_active: filter.is_active,
            comment: filter.comment.clone(),
            modified_at: Some(chrono::Utc::now().naive_utc()),
        };
        filters.push(stored.clone());
        Ok(stored)
    }

    fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let mut filters = acquire_lock(&self.filters);
        let Some(filter) = filters.iter_mut().find(|f| f.id == id) else {
            return Ok(false);
        };
        filter.is_active = active;
        Ok(true)
    }
}

impl HashStore for MemoryStore {
    fn watermark(&self) -> Result<Option<Watermark>> {
        Ok(acquire_lock(&self.hashes).watermark.clone())
    }

    fn replace_all(&self, records: &[HashRecord], watermark: &Watermark) -> Result<()> {
        let mut state = acquire_lock(&self.hashes);
        state.records = records.to_vec();
        state.watermark = Some(watermark.clone());
        Ok(())
    }

    fn contains(&self, hash: &str) -> Result<bool> {
        Ok(acquire_lock(&self.hashes)
            .records
            .iter()
            .any(|r| r.hash == hash))
    }

    fn all_hashes(&self) -> Result<HashSet<String>> {
        Ok(acquire_lock(&self.hashes)
            .records
            .iter()
            .map(|r| r.hash.clone())
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(acquire_lock(&self.hashes).records.len())
    }
}

impl BlacklistSource for MemoryStore {
    fn blacklisted_documents(&self) -> Result<Vec<HashRecord>> {
        let mut records = acquire_lock(&self.blacklist).clone();
        records.sort();
        records.dedup();
        Ok(records)
    }
}
