//! Logging and metrics wrapper around a [`CatalogClient`].

use std::sync::Arc;
use std::time::Instant;

use exercise_catalog_client::{CatalogClient, FetchError, Page, RemoteExerciseRecord};
use metrics::{counter, histogram};
use tracing::debug;

/// Wraps a catalog client and records timing and failures of every call.
#[derive(Clone)]
pub struct LoggingMiddleware<C: CatalogClient> {
    inner: Arc<C>,
}

impl<C: CatalogClient> LoggingMiddleware<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn with_logging<F, Fut, T>(&self, operation: F, name: &str) -> Result<T, FetchError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        let start = Instant::now();
        debug!("catalog request started: {}", name);

        let result = operation(self.inner.clone()).await;

        let elapsed = start.elapsed();
        histogram!("catalog_client_request_seconds").record(elapsed.as_secs_f64());
        match &result {
            Ok(_) => debug!("catalog request completed: {} in {:?}", name, elapsed),
            Err(e) => {
                counter!("catalog_client_errors_total").increment(1);
                debug!("catalog request failed: {} in {:?} - error: {}", name, elapsed, e);
            }
        }
        result
    }
}

#[async_trait::async_trait]
impl<C: CatalogClient> CatalogClient for LoggingMiddleware<C> {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page, FetchError> {
        self.with_logging(
            |client| async move { client.fetch_page(limit, offset).await },
            &format!("fetch_page(limit={limit}, offset={offset})"),
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<RemoteExerciseRecord>, FetchError> {
        self.with_logging(
            |client| async move { client.search(query).await },
            "search",
        )
        .await
    }
}
