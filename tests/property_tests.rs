//! Property-based tests for filter ordering and application.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Filters apply in ascending order within a type, whatever the insertion order
//! - Applying a non-retriggering filter list twice equals applying it once
//! - Entity encoding is undone exactly by decoding
//! - Pattern translation never panics

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use ticketcleaner::models::{decode_entities, encode_entities};
use ticketcleaner::services::{apply_filters, dialect};
use ticketcleaner::{Filter, FilterSet, FilterType};

fn body_filter(id: i64, order: i64, regex: &str, replacement: &str) -> Filter {
    Filter::new(id, FilterType::BodyContent, regex, replacement).with_order(order)
}

/// Deleting filters for fixed words; deletion of a word can never create
/// another listed word because the words share no letters with the separators.
fn deletion_filters() -> Vec<Filter> {
    ["/Best regards,?/", "/Sent from my \\w+/", "/\\[EXTERNAL\\] ?/", "/-{2,}/"]
        .iter()
        .enumerate()
        .map(|(i, regex)| body_filter(i as i64 + 1, i as i64, regex, ""))
        .collect()
}

proptest! {
    /// Property: the loaded group order is `(order, id)` regardless of input order.
    #[test]
    fn prop_group_sorted_by_order_then_id(
        orders in prop::collection::vec(proptest::option::of(-5i64..5), 1..20),
        seed in any::<u64>(),
    ) {
        let mut filters: Vec<Filter> = orders
            .iter()
            .enumerate()
            .map(|(i, order)| {
                let f = Filter::new(i as i64, FilterType::BodyContent, "/x/", "");
                match order {
                    Some(o) => f.with_order(*o),
                    None => f,
                }
            })
            .collect();
        let len = filters.len();
        filters.rotate_left((seed as usize) % len);

        let set = FilterSet::from_filters(filters);
        let keys: Vec<_> = set
            .of_type(FilterType::BodyContent)
            .iter()
            .map(|f| (f.order, f.id))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    /// Property: two overlapping filters give the same output whatever the
    /// storage insertion order, as long as `order` is respected.
    #[test]
    fn prop_storage_order_independent(text in "[a-c ]{0,40}", swap in any::<bool>()) {
        let first = body_filter(1, 1, "/ab/", "c");
        let second = body_filter(2, 2, "/cc/", "a");
        let stored = if swap {
            vec![second.clone(), first.clone()]
        } else {
            vec![first.clone(), second.clone()]
        };

        let set = FilterSet::from_filters(stored);
        let from_set = apply_filters(&text, set.of_type(FilterType::BodyContent));
        let direct = apply_filters(&text, &[first, second]);
        prop_assert_eq!(from_set.text, direct.text);
    }

    /// Property: the deletion list is idempotent on its own output.
    #[test]
    fn prop_deletion_filters_idempotent(
        parts in prop::collection::vec(
            prop::sample::select(vec![
                "Hello ", "Best regards", "Best regards,", "Sent from my iPhone",
                "[EXTERNAL] ", "--", "---", "printer ", "\n", "John",
            ]),
            0..12,
        )
    ) {
        let text: String = parts.concat();
        let filters = deletion_filters();

        let once = apply_filters(&text, &filters);
        let twice = apply_filters(&once.text, &filters);
        prop_assert_eq!(&once.text, &twice.text);
        prop_assert!(!twice.changed);
    }

    /// Property: `changed` is set exactly when the text differs.
    #[test]
    fn prop_changed_flag_matches_text(text in "[a-z ]{0,30}") {
        let filters = vec![body_filter(1, 1, "/q+/", "")];
        let outcome = apply_filters(&text, &filters);
        prop_assert_eq!(outcome.changed, outcome.text != text);
    }

    /// Property: decoding undoes encoding.
    #[test]
    fn prop_entities_round_trip(text in ".{0,60}") {
        prop_assert_eq!(decode_entities(&encode_entities(&text)), text);
    }

    /// Property: pattern translation returns a result for any input.
    #[test]
    fn prop_translate_pattern_total(pattern in ".{0,30}") {
        let _ = dialect::translate_pattern(&pattern);
        let _ = dialect::translate_replacement(&pattern);
    }

    /// Property: a literal word in slashes matches itself.
    #[test]
    fn prop_literal_pattern_matches(word in "[a-zA-Z0-9]{1,20}") {
        let filters = vec![body_filter(1, 1, &format!("/{word}/"), "")];
        let outcome = apply_filters(&format!("<{word}>"), &filters);
        prop_assert_eq!(outcome.text, "<>");
    }
}
