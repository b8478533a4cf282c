//! List controller: the single owner of query state and results.
//!
//! Mutations are plain methods that update state immediately and schedule
//! work (fetches, debounced searches). Completed work comes back as
//! [`ControllerEvent`]s on the controller's own channel, and the owner feeds
//! them back through [`ListController::process_next`],
//! [`ListController::process_pending`] or [`ListController::settle`]. Every
//! fetch is tagged with a generation and only the latest one may touch the
//! result page.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    source::{ItemSource, ItemsPage},
    state::{page_count, EmptyState, LoadStatus, PersistedStateRecord, QueryState, ResultPage},
    storage::{tag_set, StateStorage, Subscription},
    ListContext,
};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub search_debounce: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationUpdate {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

impl PaginationUpdate {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            items_per_page: None,
        }
    }

    pub fn items_per_page(items_per_page: u32) -> Self {
        Self {
            page: None,
            items_per_page: Some(items_per_page),
        }
    }
}

#[derive(Debug)]
pub enum ControllerEvent<T> {
    FetchCompleted {
        generation: u64,
        outcome: Result<ItemsPage<T>, FetchError>,
    },
    SearchSettled {
        ticket: u64,
    },
    ExternalStateChanged(PersistedStateRecord),
}

/// What handling one event did to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied { generation: u64 },
    StaleDiscarded { generation: u64, current: u64 },
    PageClamped { generation: u64, page: u32 },
    FetchFailed { generation: u64 },
    SearchApplied,
    SearchSuperseded,
    ExternalStateAdopted,
    ExternalStateUnchanged,
}

pub struct ListController<T> {
    context: ListContext,
    source: Arc<dyn ItemSource<Item = T>>,
    storage: Arc<dyn StateStorage>,
    options: ControllerOptions,
    state: QueryState,
    results: ResultPage<T>,
    status: LoadStatus,
    error: Option<FetchError>,
    generation: u64,
    in_flight: usize,
    revision: u64,
    search_ticket: u64,
    pending_search: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<ControllerEvent<T>>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent<T>>,
    _subscription: Subscription,
}

impl<T: Send + 'static> ListController<T> {
    /// Restores state from `storage` and issues the first fetch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        context: ListContext,
        source: Arc<dyn ItemSource<Item = T>>,
        storage: Arc<dyn StateStorage>,
        options: ControllerOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = QueryState::from_record(context.scope, storage.read());

        let external_tx = events_tx.clone();
        let subscription = storage.subscribe(Box::new(move |record| {
            let _ = external_tx.send(ControllerEvent::ExternalStateChanged(record));
        }));

        info!(
            scope = %context.scope,
            page = state.page,
            page_size = state.page_size,
            search = %state.search_term,
            "mounting list controller"
        );

        let mut controller = Self {
            context,
            source,
            storage,
            options,
            state,
            results: ResultPage::default(),
            status: LoadStatus::Uninitialized,
            error: None,
            generation: 0,
            in_flight: 0,
            revision: 0,
            search_ticket: 0,
            pending_search: None,
            events_tx,
            events_rx,
            _subscription: subscription,
        };
        controller.fetch();
        controller
    }

    pub fn update_search(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term == self.state.search_term && self.pending_search.is_none() {
            debug!(search = %term, "search term unchanged");
            return;
        }
        self.state.search_term = term;
        self.state.page = 1;
        self.revision += 1;
        self.schedule_search();
    }

    pub fn update_selected_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.selected_tags = tag_set(tags);
        self.state.page = 1;
        self.refresh();
    }

    pub fn update_pagination(&mut self, update: PaginationUpdate) {
        let mut changed = false;
        let mut resized = false;

        match update.items_per_page {
            Some(0) => warn!("ignoring zero items per page"),
            Some(size) if size != self.state.page_size => {
                self.state.page_size = size;
                self.state.page = 1;
                changed = true;
                resized = true;
            }
            _ => {}
        }

        if !resized {
            match update.page {
                Some(0) => warn!("ignoring page zero"),
                Some(page) if page != self.state.page => {
                    self.state.page = page;
                    changed = true;
                }
                _ => {}
            }
        }

        if changed {
            self.refresh();
        }
    }

    pub fn toggle_sorting(&mut self, field: &str) {
        if !self.state.toggle_sorting(field) {
            warn!(field, "ignoring sort request with an unusable field");
            return;
        }
        self.state.page = 1;
        self.refresh();
    }

    /// Re-issues the current request. A pending search is flushed first.
    pub fn reload(&mut self) {
        if self.pending_search.is_some() {
            self.refresh();
        } else {
            self.fetch();
        }
    }

    pub fn handle_event(&mut self, event: ControllerEvent<T>) -> EventOutcome {
        match event {
            ControllerEvent::FetchCompleted {
                generation,
                outcome,
            } => self.apply_fetch(generation, outcome),
            ControllerEvent::SearchSettled { ticket } => {
                if self.pending_search.is_none() || ticket != self.search_ticket {
                    return EventOutcome::SearchSuperseded;
                }
                self.pending_search = None;
                self.storage.write(&self.state.persisted());
                self.fetch();
                EventOutcome::SearchApplied
            }
            ControllerEvent::ExternalStateChanged(record) => self.adopt_external(record),
        }
    }

    pub async fn process_next(&mut self) -> Option<EventOutcome> {
        let event = self.events_rx.recv().await?;
        Some(self.handle_event(event))
    }

    /// Handles every event already queued without waiting.
    pub fn process_pending(&mut self) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            outcomes.push(self.handle_event(event));
        }
        outcomes
    }

    /// Processes events until no fetch is in flight and no search is pending.
    pub async fn settle(&mut self) {
        loop {
            self.process_pending();
            if self.is_settled() {
                break;
            }
            if self.process_next().await.is_none() {
                break;
            }
        }
    }

    fn refresh(&mut self) {
        self.cancel_pending_search();
        self.revision += 1;
        self.storage.write(&self.state.persisted());
        self.fetch();
    }

    fn fetch(&mut self) -> u64 {
        self.generation += 1;
        self.in_flight += 1;
        self.status = LoadStatus::Loading;

        let generation = self.generation;
        let request = self.state.request();
        debug!(
            generation,
            scope = %request.scope,
            page = request.page,
            page_size = request.page_size,
            order = ?request.order_by_field,
            reverse = request.order_by_reverse,
            search = %request.search_term,
            tags = ?request.tags,
            "issuing list fetch"
        );

        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            // A panicking source is reported as a failed fetch.
            let task = tokio::spawn(async move { source.fetch(&request).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(generation, %err, "list fetch task did not complete");
                    Err(FetchError::Transport(format!("fetch task failed: {err}")))
                }
            };
            let _ = tx.send(ControllerEvent::FetchCompleted {
                generation,
                outcome,
            });
        });
        generation
    }

    fn schedule_search(&mut self) {
        self.cancel_pending_search();
        self.search_ticket += 1;

        let ticket = self.search_ticket;
        let delay = self.options.search_debounce;
        let tx = self.events_tx.clone();
        self.pending_search = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ControllerEvent::SearchSettled { ticket });
        }));
    }

    fn apply_fetch(
        &mut self,
        generation: u64,
        outcome: Result<ItemsPage<T>, FetchError>,
    ) -> EventOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale list response");
            return EventOutcome::StaleDiscarded {
                generation,
                current: self.generation,
            };
        }

        match outcome {
            Ok(page) => {
                let total_count = page.total_count;
                let last_page = page_count(total_count, self.state.page_size);
                if self.state.page > last_page {
                    // Keep the visible page until the clamped one arrives.
                    warn!(page = self.state.page, last_page, "page out of range; clamping");
                    self.state.page = last_page;
                    self.revision += 1;
                    self.storage.replace(&self.state.persisted());
                    self.fetch();
                    return EventOutcome::PageClamped {
                        generation,
                        page: last_page,
                    };
                }

                self.status = if page.items.is_empty() {
                    LoadStatus::LoadedEmpty
                } else {
                    LoadStatus::Loaded
                };
                self.results = ResultPage {
                    items: page.items,
                    total_count,
                    loaded: true,
                };
                self.error = None;
                self.revision += 1;
                debug!(
                    generation,
                    items = self.results.items.len(),
                    total_count,
                    "applied list response"
                );
                EventOutcome::Applied { generation }
            }
            Err(error) => {
                warn!(generation, %error, "list fetch failed");
                self.error = Some(error);
                self.status = LoadStatus::Errored;
                EventOutcome::FetchFailed { generation }
            }
        }
    }

    // External navigation is adopted without writing back, so it never
    // creates another history entry.
    fn adopt_external(&mut self, record: PersistedStateRecord) -> EventOutcome {
        if record == self.state.persisted() {
            return EventOutcome::ExternalStateUnchanged;
        }
        info!(
            page = record.page,
            search = %record.search_term,
            "adopting externally navigated list state"
        );
        self.cancel_pending_search();
        self.state.adopt(record);
        self.revision += 1;
        self.fetch();
        EventOutcome::ExternalStateAdopted
    }
}

impl<T> ListController<T> {
    pub fn context(&self) -> &ListContext {
        &self.context
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn results(&self) -> &ResultPage<T> {
        &self.results
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn page_items(&self) -> &[T] {
        &self.results.items
    }

    pub fn total_items_count(&self) -> u64 {
        self.results.total_count
    }

    pub fn items_per_page(&self) -> u32 {
        self.state.page_size
    }

    pub fn page(&self) -> u32 {
        self.state.page
    }

    pub fn page_count(&self) -> u32 {
        page_count(self.results.total_count, self.state.page_size)
    }

    pub fn order_by_field(&self) -> Option<&str> {
        self.state.order_by_field.as_deref()
    }

    pub fn order_by_reverse(&self) -> bool {
        self.state.order_by_reverse
    }

    pub fn search_term(&self) -> &str {
        &self.state.search_term
    }

    pub fn selected_tags(&self) -> &BTreeSet<String> {
        &self.state.selected_tags
    }

    pub fn is_loaded(&self) -> bool {
        self.results.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn is_empty(&self) -> bool {
        self.results.loaded && self.results.items.is_empty()
    }

    pub fn has_active_filters(&self) -> bool {
        self.state.has_active_filters()
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        if !self.is_empty() {
            return None;
        }
        Some(if self.has_active_filters() {
            EmptyState::NoMatches
        } else {
            EmptyState::NoItems
        })
    }

    pub fn is_settled(&self) -> bool {
        self.in_flight == 0 && self.pending_search.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Changes whenever the query state or the loaded page changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn cancel_pending_search(&mut self) {
        if let Some(handle) = self.pending_search.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for ListController<T> {
    fn drop(&mut self) {
        self.cancel_pending_search();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
