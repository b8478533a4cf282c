use super::*;

use std::sync::Mutex;

use async_trait::async_trait;
use shared::{domain::Scope, protocol::ItemsRequest};
use tokio::sync::oneshot;
use url::Url;

use crate::{
    history::{History, MemoryHistory},
    state::StateDefaults,
    storage::UrlStateStorage,
};

const BASE: &str = "https://catalog.local/queries";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    id: u64,
}

/// Serves `total` rows sliced by the requested page.
struct CatalogSource {
    total: Mutex<u64>,
    failing: Mutex<bool>,
    requests: Mutex<Vec<ItemsRequest>>,
}

impl CatalogSource {
    fn new(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total: Mutex::new(total),
            failing: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ItemsRequest> {
        self.requests.lock().expect("lock").clone()
    }

    fn last_request(&self) -> ItemsRequest {
        self.requests().last().cloned().expect("at least one request")
    }

    fn set_failing(&self, failing: bool) {
        *self.failing.lock().expect("lock") = failing;
    }
}

#[async_trait]
impl ItemSource for CatalogSource {
    type Item = Row;

    async fn fetch(&self, request: &ItemsRequest) -> Result<ItemsPage<Row>, FetchError> {
        self.requests.lock().expect("lock").push(request.clone());
        if *self.failing.lock().expect("lock") {
            return Err(FetchError::Transport("connection reset".into()));
        }
        let total = *self.total.lock().expect("lock");
        let start = u64::from(request.page - 1) * u64::from(request.page_size);
        let end = (start + u64::from(request.page_size)).min(total);
        Ok(ItemsPage {
            items: (start..end).map(|id| Row { id }).collect(),
            total_count: total,
        })
    }
}

type Gate = oneshot::Sender<Result<ItemsPage<Row>, FetchError>>;

/// Holds every fetch open until the test resolves it.
#[derive(Default)]
struct GatedSource {
    pending: Mutex<Vec<(ItemsRequest, Option<Gate>)>>,
}

impl GatedSource {
    fn pending_len(&self) -> usize {
        self.pending.lock().expect("lock").len()
    }

    fn resolve(&self, index: usize, ids: &[u64]) {
        let gate = self.pending.lock().expect("lock")[index]
            .1
            .take()
            .expect("fetch already resolved");
        let _ = gate.send(Ok(ItemsPage {
            items: ids.iter().map(|&id| Row { id }).collect(),
            total_count: ids.len() as u64,
        }));
    }
}

#[async_trait]
impl ItemSource for GatedSource {
    type Item = Row;

    async fn fetch(&self, request: &ItemsRequest) -> Result<ItemsPage<Row>, FetchError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("lock");
            pending.push((request.clone(), Some(tx)));
        }
        rx.await
            .unwrap_or_else(|_| Err(FetchError::Transport("gate dropped".into())))
    }
}

async fn wait_for_pending(source: &GatedSource, count: usize) {
    while source.pending_len() < count {
        tokio::task::yield_now().await;
    }
}

/// Panics on every fetch.
struct PanickingSource;

#[async_trait]
impl ItemSource for PanickingSource {
    type Item = Row;

    async fn fetch(&self, _request: &ItemsRequest) -> Result<ItemsPage<Row>, FetchError> {
        panic!("source blew up")
    }
}

fn mount(
    source: Arc<dyn ItemSource<Item = Row>>,
    location: &str,
) -> (Arc<MemoryHistory>, ListController<Row>) {
    let history = MemoryHistory::new(Url::parse(location).expect("valid url"));
    let storage = Arc::new(UrlStateStorage::new(
        history.clone(),
        StateDefaults::default().with_order("created_at", true),
    ));
    let controller = ListController::new(
        ListContext::new(Scope::All, "All Queries"),
        source,
        storage,
        ControllerOptions::default(),
    );
    (history, controller)
}

#[tokio::test(start_paused = true)]
async fn first_fetch_uses_defaults_and_settles_loaded_empty() {
    let source = CatalogSource::new(0);
    let (history, mut controller) = mount(source.clone(), BASE);

    assert_eq!(controller.status(), LoadStatus::Loading);
    assert!(!controller.is_loaded());
    assert_eq!(controller.empty_state(), None);

    controller.settle().await;

    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        ItemsRequest {
            scope: Scope::All,
            page: 1,
            page_size: 25,
            order_by_field: Some("created_at".into()),
            order_by_reverse: true,
            search_term: String::new(),
            tags: Vec::new(),
        }
    );
    assert_eq!(controller.status(), LoadStatus::LoadedEmpty);
    assert!(controller.is_loaded());
    assert!(controller.is_empty());
    assert!(controller.page_items().is_empty());
    assert_eq!(controller.total_items_count(), 0);
    assert_eq!(controller.empty_state(), Some(EmptyState::NoItems));
    assert_eq!(history.len(), 1, "mounting must not push history");
}

#[tokio::test(start_paused = true)]
async fn typing_within_debounce_window_fetches_once() {
    let source = CatalogSource::new(40);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.update_search("sales");
    tokio::time::advance(Duration::from_millis(100)).await;
    controller.update_search("sales report");
    assert_eq!(controller.search_term(), "sales report");
    assert_eq!(source.requests().len(), 1);

    controller.settle().await;

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].search_term, "sales report");
    assert_eq!(requests[1].page, 1);
    assert_eq!(history.len(), 2);
    assert!(history
        .location()
        .query_pairs()
        .any(|(key, value)| key == "q" && value == "sales report"));
}

#[tokio::test(start_paused = true)]
async fn back_navigation_adopts_search_without_pushing() {
    let source = CatalogSource::new(40);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.update_search("sales");
    controller.settle().await;
    assert_eq!(history.len(), 2);
    let fetches_before = source.requests().len();

    assert!(history.back());
    controller.settle().await;

    assert_eq!(controller.search_term(), "");
    assert_eq!(source.requests().len(), fetches_before + 1);
    assert_eq!(source.last_request().search_term, "");
    assert_eq!(history.len(), 2);
    assert_eq!(history.index(), 0);

    assert!(history.forward());
    controller.settle().await;
    assert_eq!(controller.search_term(), "sales");
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn stale_response_is_discarded_even_when_it_arrives_last() {
    let source = Arc::new(GatedSource::default());
    let (_history, mut controller) = mount(source.clone(), BASE);
    wait_for_pending(&source, 1).await;

    controller.toggle_sorting("name");
    wait_for_pending(&source, 2).await;

    source.resolve(1, &[20, 21]);
    assert_eq!(
        controller.process_next().await,
        Some(EventOutcome::Applied { generation: 2 })
    );

    source.resolve(0, &[10]);
    assert_eq!(
        controller.process_next().await,
        Some(EventOutcome::StaleDiscarded {
            generation: 1,
            current: 2
        })
    );
    assert_eq!(controller.page_items(), &[Row { id: 20 }, Row { id: 21 }]);
    assert_eq!(controller.order_by_field(), Some("name"));
    assert!(controller.is_settled());
}

#[tokio::test]
async fn previous_page_stays_visible_while_loading() {
    let source = Arc::new(GatedSource::default());
    let (_history, mut controller) = mount(source.clone(), BASE);
    wait_for_pending(&source, 1).await;
    source.resolve(0, &[1, 2]);
    controller.process_next().await;
    assert_eq!(controller.status(), LoadStatus::Loaded);

    controller.update_selected_tags(["finance"]);
    assert_eq!(controller.status(), LoadStatus::Loading);
    assert!(controller.is_loaded());
    assert_eq!(controller.page_items().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_page_and_reload_recovers() {
    let source = CatalogSource::new(30);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;
    assert_eq!(controller.page_items().len(), 25);

    source.set_failing(true);
    controller.update_pagination(PaginationUpdate::page(2));
    controller.settle().await;

    assert_eq!(controller.status(), LoadStatus::Errored);
    assert!(matches!(controller.error(), Some(FetchError::Transport(_))));
    assert!(controller.is_loaded());
    assert_eq!(controller.page_items().len(), 25);
    assert_eq!(controller.page(), 2);

    source.set_failing(false);
    controller.reload();
    controller.settle().await;

    assert_eq!(controller.status(), LoadStatus::Loaded);
    assert!(controller.error().is_none());
    assert_eq!(controller.page_items().len(), 5);
    assert_eq!(source.last_request().page, 2);
}

#[tokio::test(start_paused = true)]
async fn failure_before_first_load_is_not_empty() {
    let source = CatalogSource::new(10);
    source.set_failing(true);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    assert_eq!(controller.status(), LoadStatus::Errored);
    assert!(!controller.is_loaded());
    assert!(!controller.is_empty());
    assert_eq!(controller.empty_state(), None);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_page_is_clamped_and_refetched() {
    let source = CatalogSource::new(30);
    let (history, mut controller) = mount(source.clone(), &format!("{BASE}?page=7"));
    assert_eq!(controller.page(), 7);

    controller.settle().await;

    assert_eq!(controller.page(), 2);
    assert_eq!(controller.page_count(), 2);
    assert_eq!(controller.page_items().len(), 5);
    let pages: Vec<u32> = source.requests().iter().map(|request| request.page).collect();
    assert_eq!(pages, vec![7, 2]);
    assert!(history
        .location()
        .query_pairs()
        .any(|(key, value)| key == "page" && value == "2"));
    assert_eq!(history.len(), 1, "clamping must not push history");
}

#[tokio::test(start_paused = true)]
async fn clamping_keeps_previous_page_visible() {
    let source = CatalogSource::new(30);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;
    assert_eq!(controller.page_items().len(), 25);

    controller.update_pagination(PaginationUpdate::page(9));
    assert_eq!(
        controller.process_next().await,
        Some(EventOutcome::PageClamped {
            generation: 2,
            page: 2
        })
    );
    assert_eq!(controller.page(), 2);
    assert_eq!(controller.status(), LoadStatus::Loading);
    assert_eq!(controller.page_items().len(), 25);
    assert_eq!(controller.empty_state(), None);

    controller.settle().await;
    assert_eq!(controller.status(), LoadStatus::Loaded);
    assert_eq!(controller.page_items().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn back_onto_out_of_range_entry_clamps_in_place() {
    let source = CatalogSource::new(30);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;
    history.push(Url::parse(&format!("{BASE}?page=7")).expect("valid url"));
    history.push(Url::parse(&format!("{BASE}?page=1")).expect("valid url"));

    assert!(history.back());
    controller.settle().await;

    assert_eq!(controller.page(), 2);
    assert_eq!(history.len(), 3);
    assert_eq!(history.index(), 1);
    assert!(history
        .location()
        .query_pairs()
        .any(|(key, value)| key == "page" && value == "2"));
    let pages: Vec<u32> = source.requests().iter().map(|request| request.page).collect();
    assert_eq!(pages, vec![1, 7, 2]);

    assert!(history.back());
    controller.settle().await;
    assert_eq!(controller.page(), 1);
    assert!(history.forward());
    controller.settle().await;
    assert_eq!(controller.page(), 2);
    assert_eq!(history.len(), 3);
    assert_eq!(source.last_request().page, 2);
}

#[tokio::test(start_paused = true)]
async fn filter_and_page_size_changes_reset_page() {
    let source = CatalogSource::new(500);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.update_pagination(PaginationUpdate::page(4));
    assert_eq!(controller.page(), 4);
    controller.update_selected_tags(["finance", " weekly ", ""]);
    assert_eq!(controller.page(), 1);
    assert_eq!(controller.selected_tags().len(), 2);

    controller.update_pagination(PaginationUpdate::page(3));
    controller.update_pagination(PaginationUpdate {
        page: Some(5),
        items_per_page: Some(50),
    });
    assert_eq!(controller.page(), 1);
    assert_eq!(controller.items_per_page(), 50);

    controller.update_pagination(PaginationUpdate::page(2));
    controller.update_search("revenue");
    assert_eq!(controller.page(), 1);

    controller.update_pagination(PaginationUpdate::page(3));
    controller.toggle_sorting("name");
    assert_eq!(controller.page(), 1);

    controller.settle().await;
    let last = source.last_request();
    assert_eq!(last.page, 1);
    assert_eq!(last.page_size, 50);
    assert_eq!(last.search_term, "revenue");
    assert_eq!(last.order_by_field.as_deref(), Some("name"));
    assert_eq!(last.tags, vec!["finance".to_string(), "weekly".to_string()]);
    assert!(controller.page() >= 1 && controller.page() <= controller.page_count());
}

#[tokio::test(start_paused = true)]
async fn toggle_sorting_flips_then_switches_fields() {
    let source = CatalogSource::new(5);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;
    assert!(controller.order_by_reverse());

    controller.toggle_sorting("created_at");
    assert!(!controller.order_by_reverse());
    controller.toggle_sorting("created_at");
    assert!(controller.order_by_reverse());

    controller.toggle_sorting("name");
    assert_eq!(controller.order_by_field(), Some("name"));
    assert!(!controller.order_by_reverse());

    controller.settle().await;
    assert_eq!(history.len(), 4);
    assert_eq!(source.last_request().order_by_field.as_deref(), Some("name"));
}

#[tokio::test(start_paused = true)]
async fn unusable_sort_fields_are_ignored_and_others_trimmed() {
    let source = CatalogSource::new(5);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.toggle_sorting("-name");
    controller.toggle_sorting("   ");
    assert_eq!(controller.order_by_field(), Some("created_at"));
    assert!(controller.is_settled());
    assert_eq!(history.len(), 1);

    controller.toggle_sorting(" name ");
    controller.settle().await;
    assert_eq!(controller.order_by_field(), Some("name"));
    assert!(history
        .location()
        .query_pairs()
        .any(|(key, value)| key == "order" && value == "name"));
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn identical_search_term_is_a_no_op() {
    let source = CatalogSource::new(60);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;
    controller.update_pagination(PaginationUpdate::page(2));
    controller.settle().await;
    let revision = controller.revision();

    controller.update_search("");
    assert!(controller.is_settled());
    controller.settle().await;

    assert_eq!(controller.page(), 2);
    assert_eq!(controller.revision(), revision);
    assert_eq!(source.requests().len(), 2);
    assert_eq!(history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_op_pagination_does_not_fetch() {
    let source = CatalogSource::new(5);
    let (history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.update_pagination(PaginationUpdate::page(1));
    controller.update_pagination(PaginationUpdate::page(0));
    controller.update_pagination(PaginationUpdate::items_per_page(0));
    controller.update_pagination(PaginationUpdate::default());
    controller.settle().await;

    assert_eq!(source.requests().len(), 1);
    assert_eq!(history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn immediate_mutation_absorbs_pending_search() {
    let source = CatalogSource::new(5);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.settle().await;

    controller.update_search("rev");
    controller.toggle_sorting("name");
    controller.settle().await;

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].search_term, "rev");
    assert_eq!(requests[1].order_by_field.as_deref(), Some("name"));
}

#[tokio::test(start_paused = true)]
async fn search_with_no_results_reports_no_matches() {
    let source = CatalogSource::new(0);
    let (_history, mut controller) = mount(source.clone(), BASE);
    controller.update_search("zzz");
    controller.settle().await;

    assert_eq!(controller.status(), LoadStatus::LoadedEmpty);
    assert_eq!(controller.empty_state(), Some(EmptyState::NoMatches));
}

#[tokio::test(start_paused = true)]
async fn revision_moves_on_every_visible_change() {
    let source = CatalogSource::new(60);
    let (_history, mut controller) = mount(source.clone(), BASE);
    let mounted = controller.revision();
    controller.settle().await;
    let loaded = controller.revision();
    assert!(loaded > mounted);

    controller.update_search("a");
    assert!(controller.revision() > loaded);
    let searched = controller.revision();
    controller.settle().await;
    assert!(controller.revision() > searched);
}

#[tokio::test]
async fn panicking_source_is_reported_as_failure() {
    let (_history, mut controller) = mount(Arc::new(PanickingSource), BASE);
    controller.settle().await;

    assert!(controller.is_settled());
    assert_eq!(controller.status(), LoadStatus::Errored);
    assert!(matches!(controller.error(), Some(FetchError::Transport(_))));
    assert!(!controller.is_loaded());
}
