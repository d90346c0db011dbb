//! HTTP client implementation for the remote exercise catalog.
//!
//! This module provides a reqwest-based implementation of the [`CatalogClient`](crate::CatalogClient) trait.

use crate::config::Config;
use crate::{CatalogClient, FetchError, Page, RemoteExerciseRecord};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Client for the exercise catalog using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestCatalogClient {
    base_url: String,
    api_key: Option<SecretString>,
    api_host: Option<String>,
    search_page_size: u32,
    client: reqwest::Client,
}

impl ReqwestCatalogClient {
    /// Create a new client from configuration.
    ///
    /// Connect and whole-request timeouts are both set to `config.timeout`, so
    /// a stalled catalog cannot block a sync session indefinitely.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("building http client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let api_host = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            api_host,
            search_page_size: config.search_page_size,
            client,
        })
    }

    /// Build a GET request, attaching the API key headers when configured.
    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("X-RapidAPI-Key", key.expose_secret());
            if let Some(host) = &self.api_host {
                req = req.header("X-RapidAPI-Host", host.as_str());
            }
        }
        req
    }

    /// Execute a request and decode the catalog payload.
    async fn execute_records(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<CatalogPayload, FetchError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }
        // Read body as text first so decode errors can carry a snippet.
        let text = resp.text().await?;
        serde_json::from_str::<CatalogPayload>(&text).map_err(|e| {
            let body_snippet: String = text.chars().take(512).collect();
            FetchError::Decode(format!("decoding exercises: {} - body: {}", e, body_snippet))
        })
    }

    /// Extract error information from a failed response.
    async fn error_from_response(resp: reqwest::Response) -> FetchError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        FetchError::Http {
            status,
            body: body_snippet,
        }
    }
}

/// The catalog answers either with a bare array or with a `data` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    List(Vec<RemoteExerciseRecord>),
    Envelope {
        #[serde(default)]
        metadata: Option<PageMetadata>,
        data: Vec<RemoteExerciseRecord>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMetadata {
    #[serde(default)]
    next_page: Option<String>,
}

impl CatalogPayload {
    fn into_page(self, limit: u32) -> Page {
        match self {
            CatalogPayload::List(records) => {
                let has_more = records.len() as u32 >= limit && !records.is_empty();
                Page { records, has_more }
            }
            CatalogPayload::Envelope {
                metadata: Some(meta),
                data,
            } => Page {
                has_more: meta.next_page.is_some_and(|n| !n.is_empty()),
                records: data,
            },
            CatalogPayload::Envelope {
                metadata: None,
                data,
            } => CatalogPayload::List(data).into_page(limit),
        }
    }

    fn into_records(self) -> Vec<RemoteExerciseRecord> {
        match self {
            CatalogPayload::List(records) => records,
            CatalogPayload::Envelope { data, .. } => data,
        }
    }
}

#[async_trait]
impl CatalogClient for ReqwestCatalogClient {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page, FetchError> {
        if limit == 0 {
            return Err(FetchError::Config("page limit must be greater than zero".into()));
        }
        let url = format!("{}/exercises", self.base_url);
        let qp = [("offset", offset.to_string()), ("limit", limit.to_string())];
        tracing::debug!("fetching catalog page offset={} limit={}", offset, limit);
        let payload = self.execute_records(self.get_request(&url).query(&qp)).await?;
        Ok(payload.into_page(limit))
    }

    async fn search(&self, query: &str) -> Result<Vec<RemoteExerciseRecord>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/exercises/search", self.base_url);
        let qp = [
            ("q", query.to_string()),
            ("page", "1".to_string()),
            ("pageSize", self.search_page_size.to_string()),
        ];
        let payload = self.execute_records(self.get_request(&url).query(&qp)).await?;
        Ok(payload.into_records())
    }
}
