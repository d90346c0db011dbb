//! `CatalogClient` trait and wire types for the remote exercise catalog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod retry;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// Whether a fresh attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            FetchError::Decode(_) | FetchError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// One exercise definition as published by the catalog.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExerciseRecord {
    pub exercise_id: String,
    pub name: String,
    #[serde(default, alias = "gifUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub equipments: Vec<String>,
    #[serde(default)]
    pub body_parts: Vec<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default)]
    pub secondary_muscles: Option<Vec<String>>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub instructions: Option<Vec<String>>,
    #[serde(default)]
    pub exercise_tips: Option<Vec<String>>,
    #[serde(default)]
    pub variations: Option<Vec<String>>,
}

/// One bounded batch of records returned by a single fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<RemoteExerciseRecord>,
    pub has_more: bool,
}

#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    /// Fetch `limit` records starting at `offset`. Never retries.
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page, FetchError>;

    /// Free-text lookup, not used by bulk sync.
    async fn search(&self, query: &str) -> Result<Vec<RemoteExerciseRecord>, FetchError>;
}
