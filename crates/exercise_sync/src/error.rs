//! Error types for the sync pipeline.

use exercise_catalog_client::FetchError;
use thiserror::Error;

/// Failures raised by a [`CatalogStore`](crate::store::CatalogStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Session-level sync errors, surfaced to observers as `SyncStatus::Error`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("local store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invalid sync options: {0}")]
    InvalidOptions(String),

    #[error("background execution failed: {0}")]
    Background(String),

    #[error("sync cancelled")]
    Cancelled,

    /// A terminal error reported by a session that ran elsewhere.
    #[error("{0}")]
    Session(String),
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
