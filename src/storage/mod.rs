//! Storage layer abstraction.
//!
//! Three traits separate what the cleaner needs from where it lives:
//! - [`FilterStore`]: the rewrite rules
//! - [`HashStore`]: known picture hashes and their directory watermark
//! - [`BlacklistSource`]: documents the host flagged as blacklisted
//!
//! [`SqliteStore`] implements all three against one database file;
//! [`MemoryStore`] implements them in process.

// Dropping the connection guard a few statements early buys nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStore;
pub use sqlite::{InstallReport, SqliteStore};
pub use traits::{BlacklistSource, FilterStore, HashStore};
