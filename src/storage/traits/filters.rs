//! Filter store trait.

use crate::Result;
use crate::models::{Filter, FilterSet, NewFilter};

/// Trait for filter storage backends.
///
/// # Implementor Notes
///
/// - Methods use `&self`; use interior mutability for writes
/// - `regex` and `replacement` are stored entity-encoded and must be returned
///   decoded
/// - Reads are ordered by `(type, order, id)` with a missing order first
pub trait FilterStore: Send + Sync {
    /// Loads the active filters, grouped by type and in application order.
    ///
    /// An empty store yields an empty set, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_active_filters(&self) -> Result<FilterSet>;

    /// Lists every filter, active or not, in `(type, order, id)` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_filters(&self) -> Result<Vec<Filter>>;

    /// Stores a new filter and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_filter(&self, filter: &NewFilter) -> Result<Filter>;

    /// Activates or deactivates a filter.
    ///
    /// Returns `false` if no filter has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_active(&self, id: i64, active: bool) -> Result<bool>;
}
