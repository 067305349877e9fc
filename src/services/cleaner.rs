//! Ticket text cleaning.
//!
//! Rewrites the title with the title filters and the body with the signature
//! and body filters. The body is stored entity-encoded: it is decoded before
//! filtering and encoded again only when a filter changed it, so untouched
//! bodies keep their exact stored form.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::filter_engine::{FilterOutcome, apply_filters};
use super::signature::strip_signature_blocks;
use crate::models::{FilterSet, FilterType, MutatingRecord, decode_entities, encode_entities};
use crate::storage::FilterStore;
use crate::Error;

/// Record after text cleaning.
#[derive(Debug)]
pub struct TextOutcome {
    /// Rewritten record.
    pub record: MutatingRecord,
    /// True if a title filter changed the title.
    pub title_changed: bool,
    /// True if a signature or body filter changed the body.
    pub body_changed: bool,
    /// Filters skipped because they do not compile.
    pub errors: Vec<Error>,
}

/// Applies stored filters to ticket titles and bodies.
pub struct TicketCleaner {
    filters: Arc<dyn FilterStore>,
}

impl TicketCleaner {
    /// Creates a cleaner reading filters from `filters`.
    #[must_use]
    pub fn new(filters: Arc<dyn FilterStore>) -> Self {
        Self { filters }
    }

    /// Loads the active filters, falling back to an empty set when the store
    /// cannot be read so that the host save still goes through.
    pub fn load_filters(&self) -> FilterSet {
        match self.filters.load_active_filters() {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "Cannot load filters, saving ticket unfiltered");
                FilterSet::new()
            },
        }
    }

    /// Cleans `record` with the currently active filters.
    #[instrument(skip(self, record))]
    pub fn clean_text(&self, record: &MutatingRecord) -> TextOutcome {
        let filters = self.load_filters();
        Self::clean_with(record, &filters)
    }

    /// Cleans `record` with an explicit filter set.
    #[must_use]
    pub fn clean_with(record: &MutatingRecord, filters: &FilterSet) -> TextOutcome {
        let mut cleaned = record.clone();
        let mut errors = Vec::new();
        let mut title_changed = false;
        let mut body_changed = false;

        if let Some(title) = record.name.as_deref().filter(|_| filters.has(FilterType::Title)) {
            let outcome = apply_filters(title, filters.of_type(FilterType::Title));
            title_changed = outcome.changed;
            errors.extend(outcome.errors);
            if title_changed {
                cleaned.name = Some(outcome.text);
            }
        }

        let filters_body = filters.has(FilterType::BodyContent) || filters.has(FilterType::SignatureStart);
        if let Some(content) = record.content.as_deref().filter(|_| filters_body) {
            let outcome = Self::clean_body(content, filters);
            body_changed = outcome.changed;
            errors.extend(outcome.errors);
            if body_changed {
                cleaned.content = Some(encode_entities(&outcome.text));
            }
        }

        debug!(title_changed, body_changed, skipped = errors.len(), "Ticket text cleaned");
        TextOutcome {
            record: cleaned,
            title_changed,
            body_changed,
            errors,
        }
    }

    fn clean_body(content: &str, filters: &FilterSet) -> FilterOutcome {
        let decoded = decode_entities(content);
        let stripped = strip_signature_blocks(
            &decoded,
            filters.of_type(FilterType::SignatureStart),
            filters.of_type(FilterType::SignatureEnd),
        );
        let filtered = apply_filters(&stripped.text, filters.of_type(FilterType::BodyContent));
        stripped.then(filtered)
    }
}
