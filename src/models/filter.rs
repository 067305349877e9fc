//! Text filter model.
//!
//! A filter is one rewrite rule stored by the host. Filters are grouped by
//! [`FilterType`], which decides both the field they target (title or body) and
//! their role (plain replacement or signature block delimiter).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a filter.
///
/// The integer codes are the ones used in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Matches the first line of a signature block in the body.
    SignatureStart,
    /// Matches the last line of a signature block in the body.
    SignatureEnd,
    /// Delete or replace matching text in the body.
    BodyContent,
    /// Delete or replace matching text in the title.
    Title,
}

impl FilterType {
    /// Returns all filter types in storage order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::SignatureStart,
            Self::SignatureEnd,
            Self::BodyContent,
            Self::Title,
        ]
    }

    /// Returns the storage code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::SignatureStart => 0,
            Self::SignatureEnd => 1,
            Self::BodyContent => 2,
            Self::Title => 3,
        }
    }

    /// Parses a storage code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::SignatureStart),
            1 => Some(Self::SignatureEnd),
            2 => Some(Self::BodyContent),
            3 => Some(Self::Title),
            _ => None,
        }
    }

    /// Returns the type as a lowercase hyphenated string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignatureStart => "signature-start",
            Self::SignatureEnd => "signature-end",
            Self::BodyContent => "body",
            Self::Title => "title",
        }
    }

    /// Parses a type name (case-insensitive) or a numeric storage code.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "signature-start" | "signature_start" | "0" => Some(Self::SignatureStart),
            "signature-end" | "signature_end" | "1" => Some(Self::SignatureEnd),
            "body" | "body-content" | "body_content" | "content" | "2" => Some(Self::BodyContent),
            "title" | "name" | "3" => Some(Self::Title),
            _ => None,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Unique identifier.
    pub id: i64,
    /// Human label, shown in debug traces.
    pub name: String,
    /// Category.
    pub filter_type: FilterType,
    /// Position within the type group; `None` sorts first.
    pub order: Option<i64>,
    /// Pattern in the host dialect (`/pattern/flags`).
    pub regex: String,
    /// Replacement, may contain backreferences.
    pub replacement: String,
    /// Inactive filters are never loaded by the cleaner.
    pub is_active: bool,
    /// Free text.
    pub comment: Option<String>,
    /// Last modification time.
    pub modified_at: Option<NaiveDateTime>,
}

impl Filter {
    /// Creates an active filter with no order and no metadata.
    #[must_use]
    pub fn new(
        id: i64,
        filter_type: FilterType,
        regex: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: format!("filter-{id}"),
            filter_type,
            order: None,
            regex: regex.into(),
            replacement: replacement.into(),
            is_active: true,
            comment: None,
            modified_at: None,
        }
    }

    /// Sets the order.
    #[must_use]
    pub const fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the filter inactive.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Sort key used everywhere filters are ordered: type, order, id.
    ///
    /// `None < Some(_)` matches SQL ascending order where NULL comes first.
    #[must_use]
    pub const fn sort_key(&self) -> (FilterType, Option<i64>, i64) {
        (self.filter_type, self.order, self.id)
    }
}

/// A filter definition that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFilter {
    /// Human label.
    pub name: String,
    /// Category.
    pub filter_type: FilterType,
    /// Position within the type group.
    pub order: Option<i64>,
    /// Raw pattern.
    pub regex: String,
    /// Raw replacement.
    pub replacement: String,
    /// Whether the filter is loaded by the cleaner.
    pub is_active: bool,
    /// Free text.
    pub comment: Option<String>,
}

/// Active filters grouped by type, each group in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    groups: BTreeMap<FilterType, Vec<Filter>>,
}

impl FilterSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups filters by type.
    ///
    /// Inactive filters are dropped. Each group is sorted by `(order, id)`,
    /// so the result does not depend on the order of `filters`.
    #[must_use]
    pub fn from_filters(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut groups: BTreeMap<FilterType, Vec<Filter>> = BTreeMap::new();
        for filter in filters.into_iter().filter(|f| f.is_active) {
            groups.entry(filter.filter_type).or_default().push(filter);
        }
        for group in groups.values_mut() {
            group.sort_by_key(Filter::sort_key);
        }
        Self { groups }
    }

    /// Returns the ordered filters of one type (empty when none).
    #[must_use]
    pub fn of_type(&self, filter_type: FilterType) -> &[Filter] {
        self.groups.get(&filter_type).map_or(&[][..], Vec::as_slice)
    }

    /// Returns true if at least one filter of the type is present.
    #[must_use]
    pub fn has(&self, filter_type: FilterType) -> bool {
        !self.of_type(filter_type).is_empty()
    }

    /// Returns true if the set holds no filter at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Total number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}
