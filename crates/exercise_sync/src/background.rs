//! Background execution of sync sessions.
//!
//! The host supplies the scheduler; this crate only needs "submit one unit of
//! work, hear back about its progress and terminal outcome". On platforms with
//! a persistent job scheduler the host is expected to re-run work that was
//! interrupted by process death (at-least-once); re-running is safe because
//! upserts are idempotent.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{SyncEngine, SyncOptions, SyncOutcome};
use crate::error::SyncError;
use crate::status::SyncStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of catalog sync work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRequest {
    pub options: SyncOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Succeeded,
    Failed,
    Cancelled,
}

/// Final report of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOutcome {
    pub state: TerminalState,
    pub synced: u32,
    pub message: Option<String>,
}

impl From<SyncOutcome> for WorkOutcome {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Completed(synced) => WorkOutcome {
                state: TerminalState::Succeeded,
                synced,
                message: None,
            },
            SyncOutcome::Cancelled(synced) => WorkOutcome {
                state: TerminalState::Cancelled,
                synced,
                message: None,
            },
            SyncOutcome::Failed { synced, error } => WorkOutcome {
                state: TerminalState::Failed,
                synced,
                message: Some(error.to_string()),
            },
        }
    }
}

impl WorkOutcome {
    /// The status observers see for this outcome.
    pub fn to_status(&self) -> SyncStatus {
        match self.state {
            TerminalState::Succeeded => SyncStatus::success(self.synced),
            TerminalState::Failed => SyncStatus::error(
                self.message
                    .clone()
                    .unwrap_or_else(|| "exercise sync failed".to_string()),
            ),
            TerminalState::Cancelled => SyncStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkEvent {
    /// The scheduler began executing the work.
    Started,
    Progress(SyncStatus),
    Finished(WorkOutcome),
}

/// Handle to accepted work: its id, event feed and cancel switch.
pub struct WorkHandle {
    pub id: TaskId,
    pub events: mpsc::Receiver<WorkEvent>,
    pub cancel: watch::Sender<bool>,
}

#[async_trait]
pub trait BackgroundExecutor: Send + Sync + 'static {
    /// Accept one unit of work. Returning `Ok` means the work is queued, not
    /// that it has started.
    async fn submit(&self, request: WorkRequest) -> Result<WorkHandle, SyncError>;
}

/// Runs sync work on the tokio runtime.
pub struct TokioBackgroundExecutor {
    engine: SyncEngine,
    start_delay: Duration,
}

impl TokioBackgroundExecutor {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            start_delay: Duration::ZERO,
        }
    }

    /// Hold accepted work in the queued state for `delay` before running it.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn submit(&self, request: WorkRequest) -> Result<WorkHandle, SyncError> {
        let id = TaskId::generate();
        let (event_tx, event_rx) = mpsc::channel(32);
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let engine = self.engine.clone();
        let start_delay = self.start_delay;
        let task_id = id.clone();

        tokio::spawn(async move {
            if !start_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(start_delay) => {}
                    _ = cancel_rx.changed() => {}
                }
            }
            if *cancel_rx.borrow() {
                info!("sync work {} cancelled before start", task_id);
                let outcome = WorkOutcome::from(SyncOutcome::Cancelled(0));
                let _ = event_tx.send(WorkEvent::Finished(outcome)).await;
                return;
            }

            debug!("sync work {} started", task_id);
            let _ = event_tx.send(WorkEvent::Started).await;

            let (status_tx, mut status_rx) = mpsc::channel(16);
            let progress_tx = event_tx.clone();
            let progress_handle = tokio::spawn(async move {
                while let Some(status) = status_rx.recv().await {
                    if progress_tx.send(WorkEvent::Progress(status)).await.is_err() {
                        break;
                    }
                }
            });

            let outcome = engine.run(request.options, status_tx, cancel_rx).await;
            let _ = progress_handle.await;

            debug!("sync work {} finished with {} synced", task_id, outcome.synced());
            let _ = event_tx.send(WorkEvent::Finished(outcome.into())).await;
        });

        Ok(WorkHandle {
            id,
            events: event_rx,
            cancel: cancel_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCatalogStore;
    use crate::test_utils::{ScriptedCatalogClient, catalog, drain};
    use std::sync::Arc;

    fn executor(n: usize) -> TokioBackgroundExecutor {
        let engine = SyncEngine::new(
            Arc::new(ScriptedCatalogClient::new(catalog(n))),
            Arc::new(InMemoryCatalogStore::new()),
        );
        TokioBackgroundExecutor::new(engine)
    }

    #[tokio::test]
    async fn reports_start_progress_and_outcome() {
        let handle = executor(4)
            .submit(WorkRequest {
                options: SyncOptions {
                    page_size: 2,
                    limit: None,
                },
            })
            .await
            .expect("submit");
        let events = drain(handle.events).await;
        assert_eq!(events.first(), Some(&WorkEvent::Started));
        assert!(events.contains(&WorkEvent::Progress(SyncStatus::in_progress(2))));
        assert_eq!(
            events.last(),
            Some(&WorkEvent::Finished(WorkOutcome {
                state: TerminalState::Succeeded,
                synced: 4,
                message: None,
            }))
        );
    }

    #[tokio::test]
    async fn cancel_while_queued_never_starts() {
        let handle = executor(4)
            .with_start_delay(Duration::from_secs(30))
            .submit(WorkRequest {
                options: SyncOptions::default(),
            })
            .await
            .expect("submit");
        handle.cancel.send(true).expect("cancel");
        let events = drain(handle.events).await;
        assert_eq!(
            events,
            vec![WorkEvent::Finished(WorkOutcome {
                state: TerminalState::Cancelled,
                synced: 0,
                message: None,
            })]
        );
    }

    #[test]
    fn outcome_maps_to_terminal_status() {
        let failed = WorkOutcome {
            state: TerminalState::Failed,
            synced: 3,
            message: Some("catalog fetch failed".into()),
        };
        assert_eq!(failed.to_status(), SyncStatus::error("catalog fetch failed"));
        let ok = WorkOutcome {
            state: TerminalState::Succeeded,
            synced: 3,
            message: None,
        };
        assert_eq!(ok.to_status(), SyncStatus::success(3));
    }
}
