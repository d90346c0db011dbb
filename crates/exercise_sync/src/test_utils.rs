//! Shared test utilities: a scripted in-memory catalog and a failing store.
#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use exercise_catalog_client::{CatalogClient, FetchError, Page, RemoteExerciseRecord};
use tokio::sync::{mpsc, watch};

use crate::error::StoreError;
use crate::mapper::LocalExerciseRecord;
use crate::store::{CatalogStore, UpsertOutcome};

pub fn remote_record(
    id: &str,
    name: &str,
    body_parts: &[&str],
    equipments: &[&str],
) -> RemoteExerciseRecord {
    RemoteExerciseRecord {
        exercise_id: id.to_string(),
        name: name.to_string(),
        image_url: Some(format!("https://img.example/{id}.gif")),
        video_url: None,
        equipments: equipments.iter().map(|s| s.to_string()).collect(),
        body_parts: body_parts.iter().map(|s| s.to_string()).collect(),
        target_muscles: vec!["target".to_string()],
        secondary_muscles: None,
        overview: None,
        instructions: Some(vec!["step one".to_string()]),
        exercise_tips: None,
        variations: None,
    }
}

/// `n` records with ids `ex-0 .. ex-{n-1}`.
pub fn catalog(n: usize) -> Vec<RemoteExerciseRecord> {
    (0..n)
        .map(|i| {
            remote_record(
                &format!("ex-{i}"),
                &format!("Exercise {i}"),
                &["chest"],
                &["dumbbell"],
            )
        })
        .collect()
}

/// Collect everything left in a status channel once its sender is gone.
pub async fn drain<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(v) = rx.recv().await {
        out.push(v);
    }
    out
}

#[derive(Default)]
struct Script {
    calls: Vec<(u32, u32)>,
    fail_next: VecDeque<FetchError>,
    fail_from_offset: Option<(u32, FetchError)>,
    cancel_after: Option<(usize, watch::Sender<bool>)>,
    served_page_len: Option<usize>,
}

/// Serves pages from a fixed catalog and records every call.
pub struct ScriptedCatalogClient {
    records: Vec<RemoteExerciseRecord>,
    script: Mutex<Script>,
    fetch_delay: Duration,
}

fn clone_error(e: &FetchError) -> FetchError {
    match e {
        FetchError::Network(m) => FetchError::Network(m.clone()),
        FetchError::Http { status, body } => FetchError::Http {
            status: *status,
            body: body.clone(),
        },
        FetchError::Decode(m) => FetchError::Decode(m.clone()),
        FetchError::Config(m) => FetchError::Config(m.clone()),
    }
}

impl ScriptedCatalogClient {
    pub fn new(records: Vec<RemoteExerciseRecord>) -> Self {
        Self {
            records,
            script: Mutex::new(Script::default()),
            fetch_delay: Duration::ZERO,
        }
    }

    /// Sleep this long at the start of every page fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Flip `cancel` to `true` while serving the `pages`-th call.
    pub fn cancel_after_pages(self, pages: usize, cancel: watch::Sender<bool>) -> Self {
        self.script.lock().unwrap().cancel_after = Some((pages, cancel));
        self
    }

    /// Serve `len` records per call whatever limit was asked for.
    pub fn ignore_limit(self, len: usize) -> Self {
        self.script.lock().unwrap().served_page_len = Some(len);
        self
    }

    /// Fail the next calls with these errors, in order.
    pub fn fail_next(&self, errors: Vec<FetchError>) {
        self.script.lock().unwrap().fail_next.extend(errors);
    }

    /// Fail every call at or beyond `offset`.
    pub fn fail_from_offset(&self, offset: u32, error: FetchError) {
        self.script.lock().unwrap().fail_from_offset = Some((offset, error));
    }

    pub fn fetch_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn offsets(&self) -> Vec<u32> {
        self.script.lock().unwrap().calls.iter().map(|(_, o)| *o).collect()
    }

    pub fn limits(&self) -> Vec<u32> {
        self.script.lock().unwrap().calls.iter().map(|(l, _)| *l).collect()
    }
}

#[async_trait]
impl CatalogClient for ScriptedCatalogClient {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<Page, FetchError> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let mut script = self.script.lock().unwrap();
        script.calls.push((limit, offset));
        if let Some(err) = script.fail_next.pop_front() {
            return Err(err);
        }
        if let Some((from, err)) = &script.fail_from_offset {
            if offset >= *from {
                return Err(clone_error(err));
            }
        }

        let start = (offset as usize).min(self.records.len());
        let len = script.served_page_len.unwrap_or(limit as usize);
        let end = (start + len).min(self.records.len());
        let page = Page {
            records: self.records[start..end].to_vec(),
            has_more: end < self.records.len(),
        };

        let served = script.calls.len();
        if let Some((pages, cancel)) = &script.cancel_after {
            if served == *pages {
                let _ = cancel.send(true);
            }
        }
        Ok(page)
    }

    async fn search(&self, query: &str) -> Result<Vec<RemoteExerciseRecord>, FetchError> {
        let q = query.to_lowercase();
        Ok(self
            .records
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }
}

/// A store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl CatalogStore for FailingStore {
    async fn upsert_by_remote_id(
        &self,
        _record: LocalExerciseRecord,
    ) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn exists_by_remote_id(&self, _remote_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn is_custom(&self, _local_id: i64) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn get_by_remote_id(
        &self,
        _remote_id: &str,
    ) -> Result<Option<LocalExerciseRecord>, StoreError> {
        Ok(None)
    }

    async fn insert_custom(&self, _record: LocalExerciseRecord) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }
}
