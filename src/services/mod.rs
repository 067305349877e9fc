//! Business logic services.
//!
//! Services combine the storage backends with the filter and hashing logic:
//! text cleaning, the picture hash registry and attachment dedup.

mod attachment_dedup;
mod cleaner;
pub mod dialect;
mod filter_engine;
mod hasher;
mod registry;
mod signature;

pub use attachment_dedup::{
    AttachmentDeduper, AttachmentOutcome, DedupReport, MagicProbe, MimeProbe,
};
pub use cleaner::{TextOutcome, TicketCleaner};
pub use dialect::CompiledFilter;
pub use filter_engine::{FilterOutcome, apply_filters};
pub use hasher::FileHasher;
pub use registry::{HashRegistry, RefreshOutcome};
pub use signature::strip_signature_blocks;
