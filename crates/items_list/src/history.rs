//! Navigable location history: the address bar plus back/forward entries.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAction {
    /// A new entry created by the application.
    Push,
    /// The current entry rewritten by the application.
    Replace,
    /// Back/forward traversal driven by the user.
    Pop,
}

pub type HistoryListener = Arc<dyn Fn(&Url, NavigationAction) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub trait History: Send + Sync {
    fn location(&self) -> Url;
    fn push(&self, location: Url);
    fn replace(&self, location: Url);
    fn listen(&self, listener: HistoryListener) -> ListenerId;
    fn unlisten(&self, id: ListenerId);
}

struct HistoryInner {
    entries: Vec<Url>,
    index: usize,
    next_listener: u64,
    listeners: Vec<(ListenerId, HistoryListener)>,
}

/// History kept in process memory, shaped like a browser session history.
pub struct MemoryHistory {
    inner: Mutex<HistoryInner>,
}

impl MemoryHistory {
    pub fn new(initial: Url) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HistoryInner {
                entries: vec![initial],
                index: 0,
                next_listener: 1,
                listeners: Vec::new(),
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.lock().index
    }

    pub fn entries(&self) -> Vec<Url> {
        self.lock().entries.clone()
    }

    pub fn can_go(&self, delta: isize) -> bool {
        let inner = self.lock();
        inner
            .index
            .checked_add_signed(delta)
            .is_some_and(|target| target < inner.entries.len())
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Moves `delta` entries and notifies listeners with [`NavigationAction::Pop`].
    pub fn go(&self, delta: isize) -> bool {
        if delta == 0 {
            return false;
        }
        let (location, listeners) = {
            let mut inner = self.lock();
            let Some(target) = inner
                .index
                .checked_add_signed(delta)
                .filter(|target| *target < inner.entries.len())
            else {
                return false;
            };
            inner.index = target;
            (inner.entries[target].clone(), Self::snapshot(&inner))
        };
        Self::notify(&listeners, &location, NavigationAction::Pop);
        true
    }

    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(inner: &HistoryInner) -> Vec<HistoryListener> {
        inner
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    // Called without the lock held so listeners may read the history back.
    fn notify(listeners: &[HistoryListener], location: &Url, action: NavigationAction) {
        trace!(%location, ?action, listeners = listeners.len(), "history changed");
        for listener in listeners {
            listener(location, action);
        }
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Url {
        let inner = self.lock();
        inner.entries[inner.index].clone()
    }

    fn push(&self, location: Url) {
        let listeners = {
            let mut inner = self.lock();
            let keep = inner.index + 1;
            inner.entries.truncate(keep);
            inner.entries.push(location.clone());
            inner.index = keep;
            Self::snapshot(&inner)
        };
        Self::notify(&listeners, &location, NavigationAction::Push);
    }

    fn replace(&self, location: Url) {
        let listeners = {
            let mut inner = self.lock();
            let index = inner.index;
            inner.entries[index] = location.clone();
            Self::snapshot(&inner)
        };
        Self::notify(&listeners, &location, NavigationAction::Replace);
    }

    fn listen(&self, listener: HistoryListener) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, listener));
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.lock().listeners.retain(|(existing, _)| *existing != id);
    }
}
