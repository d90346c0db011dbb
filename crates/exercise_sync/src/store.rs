//! Local catalog store capability and an in-memory implementation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::mapper::LocalExerciseRecord;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
    /// A custom record already owns this remote id and was left untouched.
    SkippedCustom(i64),
}

impl UpsertOutcome {
    pub fn local_id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id)
            | UpsertOutcome::Updated(id)
            | UpsertOutcome::SkippedCustom(id) => *id,
        }
    }
}

/// Keyed store of local exercise records.
///
/// Each call must be atomic with respect to concurrent readers; no
/// multi-record transaction is required.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// Insert or update keyed by `record.remote_id`.
    ///
    /// Updates keep the stored `id` and `created_at`. A record flagged
    /// `is_custom` is never overwritten.
    async fn upsert_by_remote_id(
        &self,
        record: LocalExerciseRecord,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn exists_by_remote_id(&self, remote_id: &str) -> Result<bool, StoreError>;

    async fn is_custom(&self, local_id: i64) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn get_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocalExerciseRecord>, StoreError>;

    /// Store a user-authored record; `is_custom` is forced to `true`.
    async fn insert_custom(&self, record: LocalExerciseRecord) -> Result<i64, StoreError>;
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, LocalExerciseRecord>,
    by_remote: HashMap<String, i64>,
}

impl Inner {
    fn insert(&mut self, mut record: LocalExerciseRecord) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        record.id = id;
        if let Some(remote_id) = &record.remote_id {
            self.by_remote.insert(remote_id.clone(), id);
        }
        self.records.insert(id, record);
        id
    }
}

/// In-memory [`CatalogStore`] guarded by a single `RwLock`.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<Inner>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records ordered by local id.
    pub async fn all(&self) -> Vec<LocalExerciseRecord> {
        let inner = self.inner.read().await;
        inner.records.values().cloned().collect()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn upsert_by_remote_id(
        &self,
        mut record: LocalExerciseRecord,
    ) -> Result<UpsertOutcome, StoreError> {
        let remote_id = record
            .remote_id
            .clone()
            .ok_or_else(|| StoreError::InvalidRecord("catalog record without remote id".into()))?;

        let mut inner = self.inner.write().await;
        let existing = inner.by_remote.get(&remote_id).copied();
        let Some(id) = existing else {
            record.is_custom = false;
            return Ok(UpsertOutcome::Inserted(inner.insert(record)));
        };
        match inner.records.get_mut(&id) {
            Some(current) if current.is_custom => Ok(UpsertOutcome::SkippedCustom(id)),
            Some(current) => {
                record.id = id;
                record.created_at = current.created_at;
                record.is_custom = false;
                *current = record;
                Ok(UpsertOutcome::Updated(id))
            }
            None => Err(StoreError::Unavailable(format!(
                "index points at missing record {id}"
            ))),
        }
    }

    async fn exists_by_remote_id(&self, remote_id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.by_remote.contains_key(remote_id))
    }

    async fn is_custom(&self, local_id: i64) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .get(&local_id)
            .map(|r| r.is_custom)
            .unwrap_or(false))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.records.len() as u64)
    }

    async fn get_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocalExerciseRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_remote
            .get(remote_id)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn insert_custom(&self, mut record: LocalExerciseRecord) -> Result<i64, StoreError> {
        record.is_custom = true;
        let mut inner = self.inner.write().await;
        if let Some(remote_id) = &record.remote_id {
            if inner.by_remote.contains_key(remote_id) {
                return Err(StoreError::InvalidRecord(format!(
                    "remote id {remote_id} already stored"
                )));
            }
        }
        Ok(inner.insert(record))
    }
}
