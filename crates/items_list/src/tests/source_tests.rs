use super::*;

use std::sync::Mutex;

use futures::FutureExt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    id: i64,
    label: String,
}

fn context(scope: Scope) -> ListContext {
    ListContext::new(scope, "Queries")
}

fn request(scope: Scope) -> ItemsRequest {
    ItemsRequest {
        scope,
        page: 1,
        page_size: 2,
        order_by_field: None,
        order_by_reverse: false,
        search_term: String::new(),
        tags: Vec::new(),
    }
}

fn static_resource(
    ids: Vec<i64>,
) -> FnResource<i64, impl Fn(ItemsRequest) -> BoxFuture<'static, Result<RawPage<i64>, FetchError>> + Send + Sync>
{
    FnResource::new(move |_request: ItemsRequest| {
        let results = ids.clone();
        async move {
            Ok::<_, FetchError>(RawPage {
                count: results.len() as u64,
                results,
            })
        }
        .boxed()
    })
}

#[test]
fn unmapped_scope_fails_at_construction() {
    let resources = ResourceMap::new().with(Scope::All, static_resource(vec![1]));
    let result = ResourceItemsSource::new(&context(Scope::Archived), &resources, |id: i64| id);
    assert!(matches!(
        result,
        Err(ConfigurationError::UnmappedScope(Scope::Archived))
    ));
}

#[tokio::test]
async fn picks_resource_by_scope_and_processes_records() {
    let resources = ResourceMap::new()
        .with(Scope::All, static_resource(vec![1, 2, 3]))
        .with(Scope::Favorites, static_resource(vec![9]));
    assert!(resources.contains(Scope::Favorites));
    assert!(!resources.contains(Scope::Mine));

    let source = ResourceItemsSource::new(&context(Scope::Favorites), &resources, |id: i64| Row {
        id,
        label: format!("query-{id}"),
    })
    .expect("favorites is mapped");
    assert_eq!(source.scope(), Scope::Favorites);

    let page = source
        .fetch(&request(Scope::Favorites))
        .await
        .expect("fetch");
    assert_eq!(page.total_count, 1);
    assert_eq!(
        page.items,
        vec![Row {
            id: 9,
            label: "query-9".into()
        }]
    );
}

#[tokio::test]
async fn resource_receives_the_full_request() {
    let seen: Arc<Mutex<Vec<ItemsRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let resource = FnResource::new(move |request: ItemsRequest| {
        recorder.lock().expect("lock").push(request);
        async move {
            Ok::<_, FetchError>(RawPage::<i64> {
                results: Vec::new(),
                count: 0,
            })
        }
        .boxed()
    });
    let resources = ResourceMap::new().with(Scope::Mine, resource);
    let source =
        ResourceItemsSource::new(&context(Scope::Mine), &resources, |id: i64| id).expect("mapped");

    let mut req = request(Scope::Mine);
    req.search_term = "sales".into();
    req.tags = vec!["finance".into()];
    source.fetch(&req).await.expect("fetch");

    assert_eq!(seen.lock().expect("lock").as_slice(), &[req]);
}

#[tokio::test]
async fn resource_errors_pass_through_untouched() {
    let resource = FnResource::new(|_request: ItemsRequest| {
        async move { Err::<RawPage<i64>, _>(FetchError::status(503, "maintenance")) }.boxed()
    });
    let resources = ResourceMap::new().with(Scope::All, resource);
    let source =
        ResourceItemsSource::new(&context(Scope::All), &resources, |id: i64| id).expect("mapped");

    let err = source
        .fetch(&request(Scope::All))
        .await
        .expect_err("should fail");
    assert!(err.is_retryable());
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}
