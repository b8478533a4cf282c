use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared::{domain::Scope, protocol::ItemsRequest};

pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Subset of the query state a [`crate::StateStorage`] exchanges with the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStateRecord {
    pub page: u32,
    pub page_size: u32,
    pub order_by_field: Option<String>,
    pub order_by_reverse: bool,
    pub search_term: String,
    pub selected_tags: BTreeSet<String>,
}

/// Values used for any field the external representation leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDefaults {
    pub page: u32,
    pub page_size: u32,
    pub order_by_field: Option<String>,
    pub order_by_reverse: bool,
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            order_by_field: None,
            order_by_reverse: false,
        }
    }
}

impl StateDefaults {
    pub fn with_order(mut self, field: impl Into<String>, reverse: bool) -> Self {
        self.order_by_field = Some(field.into());
        self.order_by_reverse = reverse;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    pub fn record(&self) -> PersistedStateRecord {
        PersistedStateRecord {
            page: self.page.max(1),
            page_size: self.page_size.max(1),
            order_by_field: self.order_by_field.clone(),
            order_by_reverse: self.order_by_field.is_some() && self.order_by_reverse,
            search_term: String::new(),
            selected_tags: BTreeSet::new(),
        }
    }
}

/// Parses `-field` / `field` / empty into an ordering.
pub fn parse_order(raw: &str) -> (Option<String>, bool) {
    let raw = raw.trim();
    match raw.strip_prefix('-') {
        Some(field) if !field.is_empty() => (Some(field.to_string()), true),
        Some(_) => (None, false),
        None if raw.is_empty() => (None, false),
        None => (Some(raw.to_string()), false),
    }
}

pub fn stringify_order(field: Option<&str>, reverse: bool) -> String {
    match field {
        Some(field) if reverse => format!("-{field}"),
        Some(field) => field.to_string(),
        None => String::new(),
    }
}

/// Number of pages needed for `total_count` items, never less than one.
pub fn page_count(total_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub scope: Scope,
    pub page: u32,
    pub page_size: u32,
    pub order_by_field: Option<String>,
    pub order_by_reverse: bool,
    pub search_term: String,
    pub selected_tags: BTreeSet<String>,
}

impl QueryState {
    pub fn from_record(scope: Scope, record: PersistedStateRecord) -> Self {
        let mut state = Self {
            scope,
            page: 1,
            page_size: 1,
            order_by_field: None,
            order_by_reverse: false,
            search_term: String::new(),
            selected_tags: BTreeSet::new(),
        };
        state.adopt(record);
        state
    }

    pub fn adopt(&mut self, record: PersistedStateRecord) {
        self.page = record.page.max(1);
        self.page_size = record.page_size.max(1);
        self.order_by_reverse = record.order_by_field.is_some() && record.order_by_reverse;
        self.order_by_field = record.order_by_field;
        self.search_term = record.search_term;
        self.selected_tags = record.selected_tags;
    }

    pub fn persisted(&self) -> PersistedStateRecord {
        PersistedStateRecord {
            page: self.page,
            page_size: self.page_size,
            order_by_field: self.order_by_field.clone(),
            order_by_reverse: self.order_by_reverse,
            search_term: self.search_term.clone(),
            selected_tags: self.selected_tags.clone(),
        }
    }

    pub fn request(&self) -> ItemsRequest {
        ItemsRequest {
            scope: self.scope,
            page: self.page,
            page_size: self.page_size,
            order_by_field: self.order_by_field.clone(),
            order_by_reverse: self.order_by_reverse,
            search_term: self.search_term.clone(),
            tags: self.selected_tags.iter().cloned().collect(),
        }
    }

    pub fn has_active_filters(&self) -> bool {
        !self.search_term.is_empty() || !self.selected_tags.is_empty()
    }

    /// Same field flips direction, a new field starts ascending.
    ///
    /// Returns `false` and leaves the order alone for a field that would not
    /// survive [`stringify_order`] and [`parse_order`]: empty after trimming,
    /// or starting with `-`.
    pub fn toggle_sorting(&mut self, field: &str) -> bool {
        let field = field.trim();
        if field.is_empty() || field.starts_with('-') {
            return false;
        }
        if self.order_by_field.as_deref() == Some(field) {
            self.order_by_reverse = !self.order_by_reverse;
        } else {
            self.order_by_field = Some(field.to_string());
            self.order_by_reverse = false;
        }
        true
    }
}

/// Result of the most recent applied fetch. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub loaded: bool,
}

impl<T> Default for ResultPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            loaded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Uninitialized,
    Loading,
    Loaded,
    LoadedEmpty,
    Errored,
}

/// Which empty-state variant the presentation should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// Nothing exists in this scope.
    NoItems,
    /// The active search or tag filter matched nothing.
    NoMatches,
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
