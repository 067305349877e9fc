//! Storage backend traits.

mod filters;
mod hashes;

pub use filters::FilterStore;
pub use hashes::{BlacklistSource, HashStore};
