//! Text filter engine.
//!
//! Applies an ordered list of filters to one text field. Filters are
//! cumulative: each one sees the output of the previous one. A filter that
//! does not compile is skipped and reported; the others still run.

use tracing::{debug, warn};

use super::dialect::CompiledFilter;
use crate::Error;
use crate::models::Filter;

/// Result of running filters over a text.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Text after every filter.
    pub text: String,
    /// True if at least one filter changed the text.
    pub changed: bool,
    /// Filters that were skipped because they do not compile.
    pub errors: Vec<Error>,
}

impl FilterOutcome {
    /// Outcome that leaves `text` untouched.
    #[must_use]
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            changed: false,
            errors: Vec::new(),
        }
    }

    /// Folds a later pass into this one.
    #[must_use]
    pub fn then(mut self, next: Self) -> Self {
        self.text = next.text;
        self.changed |= next.changed;
        self.errors.extend(next.errors);
        self
    }
}

/// Compiles `filter`, logging and recording the failure when it does not.
pub(crate) fn compile_or_report(filter: &Filter, errors: &mut Vec<Error>) -> Option<CompiledFilter> {
    match CompiledFilter::compile(filter) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            warn!(
                filter_id = filter.id,
                filter_name = %filter.name,
                error = %e,
                "Skipping filter that does not compile"
            );
            metrics::counter!("ticketcleaner_filter_compile_errors_total").increment(1);
            errors.push(e);
            None
        },
    }
}

/// Applies `filters` in the given order with global substitution.
///
/// `changed` is set when any single step produced a different text.
#[must_use]
pub fn apply_filters(text: &str, filters: &[Filter]) -> FilterOutcome {
    let mut outcome = FilterOutcome::unchanged(text);

    for filter in filters {
        let Some(compiled) = compile_or_report(filter, &mut outcome.errors) else {
            continue;
        };
        let replaced = compiled.replace_all(&outcome.text);
        if replaced != outcome.text {
            let replaced = replaced.into_owned();
            debug!(
                filter_id = compiled.id(),
                filter_name = compiled.name(),
                text = %replaced,
                "Text after filter"
            );
            metrics::counter!(
                "ticketcleaner_filters_applied_total",
                "type" => filter.filter_type.as_str()
            )
            .increment(1);
            outcome.text = replaced;
            outcome.changed = true;
        }
    }

    outcome
}
