//! Paged fetch, map and upsert of the remote exercise catalog.
//!
//! A session walks the catalog in increasing offset order and reports its
//! progress as [`SyncStatus`] values on an mpsc channel:
//!
//! 1. `Starting`
//! 2. one `InProgress { synced }` per applied page, `synced` being the running total
//! 3. exactly one terminal status: `Success`, `Error` or `Cancelled`
//!
//! Cancellation is polled between pages only; an in-flight fetch or a
//! partially applied page is always finished first. Records already written
//! stay in the store when a session fails or is cancelled.

use std::sync::Arc;

use exercise_catalog_client::config::DEFAULT_PAGE_SIZE;
use exercise_catalog_client::retry::RetryPolicy;
use exercise_catalog_client::{CatalogClient, FetchError, Page};
use futures_util::Stream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncResult};
use crate::mapper::map_remote_now;
use crate::status::SyncStatus;
use crate::store::{CatalogStore, UpsertOutcome};

/// Parameters of one sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub page_size: u32,
    /// Stop after this many records; `None` walks the whole catalog.
    pub limit: Option<u32>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            limit: None,
        }
    }
}

impl SyncOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// How a session ended, with the number of records applied.
#[derive(Debug)]
pub enum SyncOutcome {
    Completed(u32),
    Cancelled(u32),
    Failed { synced: u32, error: SyncError },
}

impl SyncOutcome {
    pub fn synced(&self) -> u32 {
        match self {
            SyncOutcome::Completed(n) | SyncOutcome::Cancelled(n) => *n,
            SyncOutcome::Failed { synced, .. } => *synced,
        }
    }

    pub fn into_result(self) -> SyncResult<u32> {
        match self {
            SyncOutcome::Completed(n) => Ok(n),
            SyncOutcome::Cancelled(_) => Err(SyncError::Cancelled),
            SyncOutcome::Failed { error, .. } => Err(error),
        }
    }
}

#[derive(Default)]
struct PageTally {
    inserted: u32,
    updated: u32,
    skipped_custom: u32,
}

#[derive(Clone)]
pub struct SyncEngine {
    client: Arc<dyn CatalogClient>,
    store: Arc<dyn CatalogStore>,
    retry: RetryPolicy,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn CatalogClient>, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            client,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one session to completion.
    ///
    /// Statuses are sent on `status_tx`; a dropped receiver does not stop the
    /// session. Setting `cancel_rx` to `true` stops it before the next page.
    pub async fn run(
        &self,
        options: SyncOptions,
        status_tx: mpsc::Sender<SyncStatus>,
        cancel_rx: watch::Receiver<bool>,
    ) -> SyncOutcome {
        self.session(options, status_tx, cancel_rx, false).await
    }

    async fn session(
        &self,
        options: SyncOptions,
        status_tx: mpsc::Sender<SyncStatus>,
        cancel_rx: watch::Receiver<bool>,
        stop_when_unobserved: bool,
    ) -> SyncOutcome {
        emit(&status_tx, SyncStatus::starting()).await;

        if options.page_size == 0 {
            return self
                .fail(
                    &status_tx,
                    0,
                    SyncError::InvalidOptions("page size must be greater than zero".into()),
                )
                .await;
        }

        let mut synced = 0u32;
        let mut offset = 0u32;
        loop {
            if *cancel_rx.borrow() {
                info!("catalog sync cancelled after {} exercises", synced);
                emit(&status_tx, SyncStatus::Cancelled).await;
                return SyncOutcome::Cancelled(synced);
            }
            if stop_when_unobserved && status_tx.is_closed() {
                info!(
                    "status stream dropped; stopping catalog sync after {} exercises",
                    synced
                );
                return SyncOutcome::Cancelled(synced);
            }

            let page_limit = match options.limit {
                Some(limit) => match limit.saturating_sub(synced) {
                    0 => break,
                    remaining => remaining.min(options.page_size),
                },
                None => options.page_size,
            };

            let mut page = match self.fetch_with_retry(page_limit, offset).await {
                Ok(page) => page,
                Err(e) => return self.fail(&status_tx, synced, e.into()).await,
            };
            metrics::counter!("catalog_sync_pages_total").increment(1);
            if page.records.len() > page_limit as usize {
                debug!(
                    "catalog returned {} records for limit {}; truncating",
                    page.records.len(),
                    page_limit
                );
                page.records.truncate(page_limit as usize);
            }

            let has_more = page.has_more;
            let fetched = page.records.len() as u32;
            let tally = match self.apply_page(page).await {
                Ok(tally) => tally,
                Err(e) => return self.fail(&status_tx, synced, e).await,
            };
            synced += fetched;
            metrics::counter!("catalog_sync_records_total").increment(u64::from(fetched));
            info!(
                "applied catalog page offset={} records={} inserted={} updated={} skipped_custom={} total={}",
                offset, fetched, tally.inserted, tally.updated, tally.skipped_custom, synced
            );

            if fetched > 0 {
                emit(&status_tx, SyncStatus::in_progress(synced)).await;
            }
            if !has_more || fetched == 0 {
                break;
            }
            offset = offset.saturating_add(options.page_size);
        }

        info!("catalog sync finished: {} exercises", synced);
        emit(&status_tx, SyncStatus::success(synced)).await;
        SyncOutcome::Completed(synced)
    }

    /// Lazily run a fresh session; nothing happens until the stream is first
    /// polled. The stream ends after the terminal status.
    ///
    /// Dropping the stream stops the session at the next page boundary, the
    /// same way `cancel_rx` does.
    pub fn stream(
        &self,
        options: SyncOptions,
        cancel_rx: watch::Receiver<bool>,
    ) -> impl Stream<Item = SyncStatus> + Send + 'static {
        enum State {
            Pending(SyncEngine, SyncOptions, watch::Receiver<bool>),
            Running(mpsc::Receiver<SyncStatus>),
        }

        let initial = State::Pending(self.clone(), options, cancel_rx);
        futures_util::stream::unfold(initial, |state| async move {
            let mut rx = match state {
                State::Pending(engine, options, cancel_rx) => {
                    let (tx, rx) = mpsc::channel(16);
                    tokio::spawn(async move {
                        engine.session(options, tx, cancel_rx, true).await;
                    });
                    rx
                }
                State::Running(rx) => rx,
            };
            rx.recv().await.map(|status| (status, State::Running(rx)))
        })
    }

    /// Run a session without streaming and return the synced count.
    pub async fn sync_once(&self, options: SyncOptions) -> SyncResult<u32> {
        let (status_tx, status_rx) = mpsc::channel(1);
        drop(status_rx);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run(options, status_tx, cancel_rx).await.into_result()
    }

    async fn fetch_with_retry(&self, limit: u32, offset: u32) -> Result<Page, FetchError> {
        let client = self.client.clone();
        self.retry
            .retry_async_if(
                || {
                    let client = client.clone();
                    async move { client.fetch_page(limit, offset).await }
                },
                FetchError::is_retryable,
            )
            .await
    }

    async fn apply_page(&self, page: Page) -> SyncResult<PageTally> {
        let mut tally = PageTally::default();
        for remote in page.records {
            let local = map_remote_now(&remote);
            match self.store.upsert_by_remote_id(local).await? {
                UpsertOutcome::Inserted(_) => tally.inserted += 1,
                UpsertOutcome::Updated(_) => tally.updated += 1,
                UpsertOutcome::SkippedCustom(id) => {
                    debug!(
                        "kept custom exercise {} over catalog record {}",
                        id, remote.exercise_id
                    );
                    tally.skipped_custom += 1;
                }
            }
        }
        Ok(tally)
    }

    async fn fail(
        &self,
        status_tx: &mpsc::Sender<SyncStatus>,
        synced: u32,
        error: SyncError,
    ) -> SyncOutcome {
        metrics::counter!("catalog_sync_failures_total").increment(1);
        error!("catalog sync failed after {} exercises: {}", synced, error);
        emit(status_tx, SyncStatus::error(error.to_string())).await;
        SyncOutcome::Failed { synced, error }
    }
}

async fn emit(status_tx: &mpsc::Sender<SyncStatus>, status: SyncStatus) {
    if status_tx.send(status).await.is_err() {
        debug!("sync status receiver dropped");
    }
}
