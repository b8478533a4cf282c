use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use shared::{
    domain::Scope,
    protocol::{ItemsRequest, RawPage},
};
use tracing::{debug, warn};

use crate::{
    error::{ConfigurationError, FetchError},
    ListContext,
};

/// One page of processed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemsPage<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

#[async_trait]
pub trait ItemSource: Send + Sync {
    type Item: Send + 'static;

    async fn fetch(&self, request: &ItemsRequest) -> Result<ItemsPage<Self::Item>, FetchError>;
}

/// A fetch function returning raw records for one page.
#[async_trait]
pub trait Resource: Send + Sync {
    type Record: Send + 'static;

    async fn fetch(&self, request: &ItemsRequest) -> Result<RawPage<Self::Record>, FetchError>;
}

/// Adapts a plain closure into a [`Resource`].
pub struct FnResource<R, F> {
    fetch: F,
    _record: PhantomData<fn() -> R>,
}

impl<R, F> FnResource<R, F>
where
    F: Fn(ItemsRequest) -> BoxFuture<'static, Result<RawPage<R>, FetchError>> + Send + Sync,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R, F> Resource for FnResource<R, F>
where
    R: Send + 'static,
    F: Fn(ItemsRequest) -> BoxFuture<'static, Result<RawPage<R>, FetchError>> + Send + Sync,
{
    type Record = R;

    async fn fetch(&self, request: &ItemsRequest) -> Result<RawPage<R>, FetchError> {
        (self.fetch)(request.clone()).await
    }
}

/// Scope to fetch-function table. Lookups never fall back to another scope.
pub struct ResourceMap<R> {
    entries: HashMap<Scope, Arc<dyn Resource<Record = R>>>,
}

impl<R: Send + 'static> Default for ResourceMap<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> ResourceMap<R> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, scope: Scope, resource: impl Resource<Record = R> + 'static) -> Self {
        self.entries.insert(scope, Arc::new(resource));
        self
    }

    pub fn insert_shared(&mut self, scope: Scope, resource: Arc<dyn Resource<Record = R>>) {
        self.entries.insert(scope, resource);
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.entries.contains_key(&scope)
    }

    pub fn resolve(&self, scope: Scope) -> Result<Arc<dyn Resource<Record = R>>, ConfigurationError> {
        self.entries
            .get(&scope)
            .cloned()
            .ok_or(ConfigurationError::UnmappedScope(scope))
    }
}

pub type ItemProcessor<R, T> = Arc<dyn Fn(R) -> T + Send + Sync>;

/// Item source that picks its fetch function from the list scope and maps
/// every raw record through a processor.
pub struct ResourceItemsSource<R, T> {
    scope: Scope,
    resource: Arc<dyn Resource<Record = R>>,
    processor: ItemProcessor<R, T>,
}

impl<R, T> ResourceItemsSource<R, T>
where
    R: Send + 'static,
    T: Send + 'static,
{
    pub fn new(
        context: &ListContext,
        resources: &ResourceMap<R>,
        processor: impl Fn(R) -> T + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        let resource = resources.resolve(context.scope)?;
        debug!(scope = %context.scope, "resolved list resource");
        Ok(Self {
            scope: context.scope,
            resource,
            processor: Arc::new(processor),
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

#[async_trait]
impl<R, T> ItemSource for ResourceItemsSource<R, T>
where
    R: Send + 'static,
    T: Send + 'static,
{
    type Item = T;

    async fn fetch(&self, request: &ItemsRequest) -> Result<ItemsPage<T>, FetchError> {
        if request.scope != self.scope {
            warn!(
                expected = %self.scope,
                requested = %request.scope,
                "request scope differs from the resolved resource scope"
            );
        }
        let raw = self.resource.fetch(request).await?;
        let processor = Arc::clone(&self.processor);
        let items = raw.results.into_iter().map(|record| processor(record)).collect();
        Ok(ItemsPage {
            items,
            total_count: raw.count,
        })
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
