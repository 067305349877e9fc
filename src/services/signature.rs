//! Signature block removal.
//!
//! A block opens at the first match of a signature-start filter and closes at
//! the end of the first match of a signature-end filter found after it. End
//! filters are tried in their own order and the first one that matches wins.
//! Without a closing match the block runs to the end of the text. The whole
//! block is replaced by the start filter's replacement, expanded against the
//! start match.

use tracing::debug;

use super::dialect::CompiledFilter;
use super::filter_engine::{FilterOutcome, compile_or_report};
use crate::models::Filter;

/// Removes one signature block per start filter, in start-filter order.
#[must_use]
pub fn strip_signature_blocks(text: &str, starts: &[Filter], ends: &[Filter]) -> FilterOutcome {
    let mut outcome = FilterOutcome::unchanged(text);
    if starts.is_empty() {
        return outcome;
    }

    let ends: Vec<_> = ends
        .iter()
        .filter_map(|f| compile_or_report(f, &mut outcome.errors))
        .collect();

    for start in starts {
        let Some(start) = compile_or_report(start, &mut outcome.errors) else {
            continue;
        };
        let Some((rewritten, block_start, block_end)) = remove_block(&outcome.text, &start, &ends)
        else {
            continue;
        };

        if rewritten != outcome.text {
            debug!(
                filter_id = start.id(),
                filter_name = start.name(),
                block_start,
                block_end,
                "Signature block removed"
            );
            metrics::counter!("ticketcleaner_signature_blocks_removed_total").increment(1);
            outcome.text = rewritten;
            outcome.changed = true;
        }
    }

    outcome
}

/// Rewrites the block opened by `start`, returning the new text and the
/// replaced byte range.
fn remove_block(
    text: &str,
    start: &CompiledFilter,
    ends: &[CompiledFilter],
) -> Option<(String, usize, usize)> {
    let opening = start.captures_at(text, 0)?;
    let whole = opening.get(0)?;

    let block_end = ends
        .iter()
        .find_map(|end| {
            end.captures_at(text, start.match_end(&opening))
                .map(|closing| end.match_end(&closing))
        })
        .unwrap_or(text.len());

    let mut rewritten = String::with_capacity(text.len());
    rewritten.push_str(&text[..whole.start()]);
    rewritten.push_str(&start.expand(&opening));
    rewritten.push_str(&text[block_end..]);
    Some((rewritten, whole.start(), block_end))
}
