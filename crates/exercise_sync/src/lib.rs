//! One-way synchronisation of a remote exercise catalog into a local store.
//!
//! The [`SyncCoordinator`] is the public entry point: it schedules sessions on a
//! [`BackgroundExecutor`], refuses to run two at once and republishes progress
//! as a replay-latest [`SyncStatus`] feed. A session itself is a
//! [`SyncEngine::run`]: paged fetch, [`mapper::map_remote`], upsert.

pub mod background;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod middleware;
pub mod status;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use background::{BackgroundExecutor, TaskId, TokioBackgroundExecutor};
pub use coordinator::{SyncCoordinator, SyncRequest};
pub use engine::{SyncEngine, SyncOptions, SyncOutcome};
pub use error::{StoreError, SyncError, SyncResult};
pub use mapper::LocalExerciseRecord;
pub use middleware::LoggingMiddleware;
pub use status::SyncStatus;
pub use store::{CatalogStore, InMemoryCatalogStore, UpsertOutcome};
