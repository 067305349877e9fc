//! Data models for ticketcleaner.
//!
//! This module contains the core data structures shared by storage, services
//! and hooks.

mod filter;
mod hash;
pub mod markup;
mod record;

pub use filter::{Filter, FilterSet, FilterType, NewFilter};
pub use hash::{HashRecord, RegistryStats, WATERMARK_FORMAT, Watermark};
pub use markup::{decode_entities, encode_entities};
pub use record::MutatingRecord;
