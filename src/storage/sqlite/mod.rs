//! `SQLite` storage backend.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition, pragmas, transaction wrapper
//! - [`schema`]: install, upgrade and uninstall
//! - `store`: the [`SqliteStore`] handle
//! - `filters` / `hashes`: trait implementations
//! - `metrics`: per-operation counters and latency histograms

pub mod connection;
mod filters;
mod hashes;
mod metrics;
pub mod schema;
mod store;

pub use connection::{acquire_lock, configure_connection, with_transaction};
pub use schema::InstallReport;
pub use store::SqliteStore;
