use std::{
    collections::BTreeSet,
    fmt,
    sync::{Arc, Mutex},
};

use tracing::{debug, warn};
use url::Url;

use crate::{
    history::{History, NavigationAction},
    state::{parse_order, stringify_order, PersistedStateRecord, StateDefaults},
};

const PAGE_KEY: &str = "page";
const PAGE_SIZE_KEY: &str = "page_size";
const ORDER_KEY: &str = "order";
const SEARCH_KEY: &str = "q";
const TAGS_KEY: &str = "tags";
const STATE_KEYS: [&str; 5] = [PAGE_KEY, PAGE_SIZE_KEY, ORDER_KEY, SEARCH_KEY, TAGS_KEY];

pub type StateListener = Box<dyn Fn(PersistedStateRecord) + Send + Sync>;

/// Cancels a [`StateStorage::subscribe`] registration when cancelled or dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub trait StateStorage: Send + Sync {
    fn read(&self) -> PersistedStateRecord;

    fn write(&self, record: &PersistedStateRecord);

    /// Rewrites the current entry instead of adding one.
    fn replace(&self, record: &PersistedStateRecord);

    /// Reports changes made by something other than [`StateStorage::write`].
    fn subscribe(&self, listener: StateListener) -> Subscription;
}

/// Keeps the state in process memory. Nothing external can change it.
pub struct MemoryStateStorage {
    record: Mutex<PersistedStateRecord>,
}

impl MemoryStateStorage {
    pub fn new(defaults: StateDefaults) -> Self {
        Self {
            record: Mutex::new(defaults.record()),
        }
    }
}

impl StateStorage for MemoryStateStorage {
    fn read(&self) -> PersistedStateRecord {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write(&self, record: &PersistedStateRecord) {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = record.clone();
    }

    fn replace(&self, record: &PersistedStateRecord) {
        self.write(record);
    }

    fn subscribe(&self, _listener: StateListener) -> Subscription {
        Subscription::noop()
    }
}

/// Binds the state to the query string of the current history location.
pub struct UrlStateStorage {
    history: Arc<dyn History>,
    defaults: StateDefaults,
}

impl UrlStateStorage {
    pub fn new(history: Arc<dyn History>, defaults: StateDefaults) -> Self {
        Self { history, defaults }
    }

    pub fn defaults(&self) -> &StateDefaults {
        &self.defaults
    }
}

impl StateStorage for UrlStateStorage {
    fn read(&self) -> PersistedStateRecord {
        record_from_location(&self.history.location(), &self.defaults)
    }

    fn write(&self, record: &PersistedStateRecord) {
        let current = self.history.location();
        let next = location_with_record(&current, record);
        if next == current {
            debug!(%current, "state unchanged; skipping history push");
            return;
        }
        debug!(location = %next, "pushing list state");
        self.history.push(next);
    }

    fn replace(&self, record: &PersistedStateRecord) {
        let current = self.history.location();
        let next = location_with_record(&current, record);
        if next != current {
            debug!(location = %next, "replacing list state");
            self.history.replace(next);
        }
    }

    fn subscribe(&self, listener: StateListener) -> Subscription {
        let defaults = self.defaults.clone();
        let id = self.history.listen(Arc::new(move |location: &Url, action: NavigationAction| {
            if action != NavigationAction::Pop {
                return;
            }
            listener(record_from_location(location, &defaults));
        }));
        let history = Arc::clone(&self.history);
        Subscription::new(move || history.unlisten(id))
    }
}

pub fn record_from_location(location: &Url, defaults: &StateDefaults) -> PersistedStateRecord {
    let mut record = defaults.record();
    let mut order: Option<String> = None;

    for (key, value) in location.query_pairs() {
        match &*key {
            PAGE_KEY => record.page = parse_positive(PAGE_KEY, &value).unwrap_or(record.page),
            PAGE_SIZE_KEY => {
                record.page_size = parse_positive(PAGE_SIZE_KEY, &value).unwrap_or(record.page_size)
            }
            ORDER_KEY => order = Some(value.into_owned()),
            SEARCH_KEY => record.search_term = value.into_owned(),
            TAGS_KEY if !value.trim().is_empty() => {
                record.selected_tags.insert(value.trim().to_string());
            }
            _ => {}
        }
    }

    // Searching without an explicit order leaves ranking to the server.
    match order {
        Some(raw) => {
            let (field, reverse) = parse_order(&raw);
            record.order_by_field = field;
            record.order_by_reverse = reverse;
        }
        None if !record.search_term.is_empty() => {
            record.order_by_field = None;
            record.order_by_reverse = false;
        }
        None => {}
    }

    record
}

pub fn location_with_record(location: &Url, record: &PersistedStateRecord) -> Url {
    let retained: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| !STATE_KEYS.contains(&&**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut next = location.clone();
    next.set_query(None);
    {
        let mut pairs = next.query_pairs_mut();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(PAGE_KEY, &record.page.to_string());
        pairs.append_pair(PAGE_SIZE_KEY, &record.page_size.to_string());
        pairs.append_pair(
            ORDER_KEY,
            &stringify_order(record.order_by_field.as_deref(), record.order_by_reverse),
        );
        if !record.search_term.is_empty() {
            pairs.append_pair(SEARCH_KEY, &record.search_term);
        }
        for tag in &record.selected_tags {
            pairs.append_pair(TAGS_KEY, tag);
        }
    }
    next
}

fn parse_positive(key: &str, raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = raw, "ignoring malformed list state value");
            None
        }
    }
}

pub(crate) fn tag_set<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter()
        .map(Into::into)
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "tests/storage_tests.rs"]
mod tests;
