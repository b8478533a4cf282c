use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{ItemsRequest, RawPage, TagCount, TagList},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ConfigurationError, FetchError},
    source::Resource,
};

/// Resolves `path` against `base`, treating `base` as a directory.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, ConfigurationError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|err| ConfigurationError::InvalidEndpoint {
            endpoint: path.to_string(),
            reason: err.to_string(),
        })
}

/// List endpoint returning `{ "results": [...], "count": n }` pages.
pub struct HttpResource<R> {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    _record: PhantomData<fn() -> R>,
}

impl<R> HttpResource<R> {
    pub fn new(base: &Url, path: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_url(base, path)?,
            api_key: None,
            _record: PhantomData,
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl<R> Resource for HttpResource<R>
where
    R: DeserializeOwned + Send + 'static,
{
    type Record = R;

    async fn fetch(&self, request: &ItemsRequest) -> Result<RawPage<R>, FetchError> {
        let builder = self
            .client
            .get(self.endpoint.clone())
            .query(&request.query_pairs());
        let response = send(authorize(builder, self.api_key.as_deref())).await?;
        let page: RawPage<R> = response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        debug!(
            endpoint = %self.endpoint,
            results = page.results.len(),
            count = page.count,
            "fetched list page"
        );
        Ok(page)
    }
}

/// Vocabulary of tags offered by the tag filter.
#[async_trait]
pub trait TagVocabulary: Send + Sync {
    async fn tags(&self) -> Result<Vec<TagCount>, FetchError>;
}

pub struct MissingTagVocabulary;

#[async_trait]
impl TagVocabulary for MissingTagVocabulary {
    async fn tags(&self) -> Result<Vec<TagCount>, FetchError> {
        Err(FetchError::Transport("tag vocabulary is unavailable".into()))
    }
}

pub struct HttpTagVocabulary {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTagVocabulary {
    pub fn new(base: &Url, path: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_url(base, path)?,
            api_key: None,
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl TagVocabulary for HttpTagVocabulary {
    async fn tags(&self) -> Result<Vec<TagCount>, FetchError> {
        let builder = self.client.get(self.endpoint.clone());
        let response = send(authorize(builder, self.api_key.as_deref())).await?;
        let list: TagList = response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(list.tags)
    }
}

fn authorize(builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => builder.header(AUTHORIZATION, format!("Key {key}")),
        None => builder,
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, FetchError> {
    let response = builder
        .send()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => api_error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    warn!(status = status.as_u16(), %message, "list endpoint rejected request");
    Err(FetchError::status(status.as_u16(), message))
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
