//! Picture hash store trait.
//!
//! The store keeps the set of known nuisance-file hashes and the watermark of
//! the directory scan it was built from.
//!
//! ## Atomicity
//!
//! | Backend | `replace_all` | Readers during refresh |
//! |---------|---------------|------------------------|
//! | `SQLite` | One `BEGIN IMMEDIATE` transaction | See the previous set |
//! | Memory | One lock | Block until done |

use std::collections::HashSet;

use crate::Result;
use crate::models::{HashRecord, Watermark};

/// Trait for hash registry backends.
pub trait HashStore: Send + Sync {
    /// Returns the stored watermark, or `None` before the first population.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn watermark(&self) -> Result<Option<Watermark>>;

    /// Replaces every record and the watermark in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the previous contents are kept.
    fn replace_all(&self, records: &[HashRecord], watermark: &Watermark) -> Result<()>;

    /// Returns true if `hash` is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn contains(&self, hash: &str) -> Result<bool>;

    /// Returns every registered hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn all_hashes(&self) -> Result<HashSet<String>>;

    /// Returns the number of stored records (duplicates included).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self) -> Result<usize>;
}

/// Source of host documents flagged as blacklisted.
pub trait BlacklistSource: Send + Sync {
    /// Returns the distinct `(hash, filename)` pairs of blacklisted documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the host store cannot be read.
    fn blacklisted_documents(&self) -> Result<Vec<HashRecord>>;
}
