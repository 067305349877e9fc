//! # Ticketcleaner
//!
//! Content sanitization and signature-image deduplication for helpdesk tickets.
//!
//! Ticketcleaner runs inside a ticketing host's save path. Before a ticket or a
//! followup is created or updated, the host hands the record to the cleaner,
//! which:
//!
//! - rewrites the title and body with an ordered set of regex filters
//!   (signature blocks, mail client boilerplate, injected strings)
//! - on creation from the mail gateway, drops attached images whose SHA-1 is
//!   registered as a known signature image (company logos and the like)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────────────────────────────────────┐
//! │ Host / CLI   │───▶│ CleanerHooks (LifecycleHooks)             │
//! └──────────────┘    │  ┌──────────────┐   ┌───────────────────┐ │
//!                     │  │ Text filters │   │ Attachment dedup  │ │
//!                     │  └──────┬───────┘   └─────────┬─────────┘ │
//!                     └─────────┼─────────────────────┼───────────┘
//!                               ▼                     ▼
//!                        ┌─────────────┐      ┌───────────────┐
//!                        │ FilterStore │      │ HashRegistry  │
//!                        └─────────────┘      └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ticketcleaner::{CleanerHooks, LifecycleHooks, MutatingRecord};
//!
//! let hooks = CleanerHooks::from_config(&config)?;
//! let cleaned = hooks.on_before_create(&record)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod hooks;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::CleanerConfig;
pub use hooks::{CleanerHooks, HookEvent, LifecycleHooks};
pub use models::{Filter, FilterSet, FilterType, HashRecord, MutatingRecord};
pub use services::{AttachmentDeduper, HashRegistry, TicketCleaner};
pub use storage::{BlacklistSource, FilterStore, HashStore};

/// Error type for ticketcleaner operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Storage` | A filter, hash or watermark read/write fails |
/// | `FilterCompilation` | A stored filter pattern cannot be translated or compiled |
/// | `Probe` | An attachment cannot be typed or hashed |
/// | `Configuration` | Config file unreadable, required paths missing |
/// | `InvalidInput` | Malformed hook payload or CLI argument |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A persistence operation failed.
    ///
    /// This is the only error that is allowed to abort the host's save.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A filter pattern could not be compiled.
    ///
    /// The offending filter is skipped; the other filters still run.
    #[error("filter {filter_id} does not compile: {cause}")]
    FilterCompilation {
        /// Identifier of the offending filter.
        filter_id: i64,
        /// Why the pattern was rejected.
        cause: String,
    },

    /// MIME detection or hashing failed for one attachment.
    #[error("cannot probe '{path}': {cause}")]
    Probe {
        /// The staged attachment path.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration is missing or unreadable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Builds a [`Error::Storage`] from any displayable cause.
    pub fn storage(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for ticketcleaner operations.
pub type Result<T> = std::result::Result<T, Error>;
