//! Single entry point for starting, cancelling and observing catalog syncs.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use crate::background::{BackgroundExecutor, TaskId, WorkEvent, WorkRequest};
use crate::engine::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::status::SyncStatus;

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// A new session was queued.
    Started(TaskId),
    /// A session was already running; the caller shares its status feed.
    Attached(TaskId),
}

impl SyncRequest {
    pub fn task_id(&self) -> &TaskId {
        match self {
            SyncRequest::Started(id) | SyncRequest::Attached(id) => id,
        }
    }
}

struct ActiveSession {
    id: TaskId,
    cancel: watch::Sender<bool>,
}

/// Allows at most one sync session at a time and republishes its status.
#[derive(Clone)]
pub struct SyncCoordinator {
    executor: Arc<dyn BackgroundExecutor>,
    options: SyncOptions,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl SyncCoordinator {
    pub fn new(executor: Arc<dyn BackgroundExecutor>, options: SyncOptions) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Self {
            executor,
            options,
            status_tx: Arc::new(status_tx),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start a full sync, or attach to the one already running.
    pub async fn sync_now(&self) -> SyncResult<SyncRequest> {
        self.start(self.options).await
    }

    /// Like [`sync_now`](Self::sync_now) but stop after `limit` records.
    pub async fn sync_with_limit(&self, limit: u32) -> SyncResult<SyncRequest> {
        self.start(self.options.with_limit(limit)).await
    }

    /// Start (or attach to) a session and wait for its terminal status.
    pub async fn sync_and_wait(&self) -> SyncResult<u32> {
        self.sync_now().await?;
        self.await_completion().await
    }

    /// Ask the running session to stop before its next page.
    ///
    /// Returns `false` when nothing was running.
    pub async fn cancel_all_sync(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => {
                info!("cancelling catalog sync {}", session.id);
                let _ = session.cancel.send(true);
                true
            }
            None => false,
        }
    }

    /// Subscribe to status changes; the current value is seen immediately.
    pub fn observe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    pub async fn is_syncing(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Return to `Idle` once the last session has finished.
    pub fn reset(&self) -> bool {
        self.status_tx.send_if_modified(|current| {
            if current.is_terminal() {
                *current = SyncStatus::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Wait for the current session's terminal status and turn it into a result.
    ///
    /// With no session running, the result of the last finished session is
    /// returned again until [`reset`](Self::reset) clears it; after a reset, or
    /// before any session, this is an error.
    pub async fn await_completion(&self) -> SyncResult<u32> {
        let mut rx = self.observe_status();
        let idle = matches!(*rx.borrow(), SyncStatus::Idle);
        if idle && !self.is_syncing().await {
            return Err(SyncError::Background("no sync session to wait for".into()));
        }
        let status = rx
            .wait_for(SyncStatus::is_terminal)
            .await
            .map_err(|_| SyncError::Background("status feed closed".into()))?
            .clone();
        match status {
            SyncStatus::Success {
                total_exercises, ..
            } => Ok(total_exercises),
            SyncStatus::Error { message } => Err(SyncError::Session(message)),
            SyncStatus::Cancelled => Err(SyncError::Cancelled),
            SyncStatus::Idle
            | SyncStatus::Queued
            | SyncStatus::Starting { .. }
            | SyncStatus::InProgress { .. } => Err(SyncError::Background(format!(
                "unexpected non-terminal status {status:?}"
            ))),
        }
    }

    async fn start(&self, options: SyncOptions) -> SyncResult<SyncRequest> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref() {
            info!("catalog sync {} already running; attaching", session.id);
            return Ok(SyncRequest::Attached(session.id.clone()));
        }

        self.status_tx.send_replace(SyncStatus::Queued);
        let handle = match self.executor.submit(WorkRequest { options }).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("catalog sync could not be scheduled: {}", e);
                self.status_tx.send_replace(SyncStatus::error(e.to_string()));
                return Err(e);
            }
        };

        let id = handle.id.clone();
        info!("catalog sync {} queued", id);
        *active = Some(ActiveSession {
            id: id.clone(),
            cancel: handle.cancel,
        });

        let status_tx = self.status_tx.clone();
        let sessions = self.active.clone();
        tokio::spawn(pump_events(handle.events, status_tx, sessions, id.clone()));

        Ok(SyncRequest::Started(id))
    }
}

/// Translate work events into the published status for one session.
async fn pump_events(
    mut events: mpsc::Receiver<WorkEvent>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    id: TaskId,
) {
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        match event {
            WorkEvent::Started => debug!("catalog sync {} started", id),
            // Terminal statuses are taken from the work outcome instead.
            WorkEvent::Progress(status) if status.is_terminal() => {}
            WorkEvent::Progress(status) => {
                status_tx.send_if_modified(|current| {
                    if current.advances_to(&status) {
                        *current = status;
                        true
                    } else {
                        debug!("dropping out-of-order status {:?} after {:?}", status, current);
                        false
                    }
                });
            }
            WorkEvent::Finished(outcome) => {
                terminal = Some(outcome.to_status());
                break;
            }
        }
    }

    let terminal = terminal.unwrap_or_else(|| {
        warn!("catalog sync {} ended without an outcome", id);
        SyncStatus::error("background work ended without a result")
    });

    // Clearing the session and publishing its terminal status happen under the
    // same lock `start` takes, so a new session's `Queued` always comes after.
    let mut guard = active.lock().await;
    if guard.as_ref().is_some_and(|s| s.id == id) {
        *guard = None;
    }
    status_tx.send_replace(terminal.clone());
    drop(guard);
    info!("catalog sync {} finished: {:?}", id, terminal);
}
