//! `CheckpointStore`: the pluggable persistence trait, plus a reference
//! in-memory implementation.
//!
//! `SaveState` always chains off the thread's current latest checkpoint;
//! `Rollback` re-points that "current latest" pointer at a historical
//! checkpoint without touching the checkpoint it points to, so the next
//! `SaveState` branches from there — time-travel without ever deleting
//! history.

use crate::checkpoint::{Checkpoint, CheckpointMetadata};
use crate::error::{CheckpointError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save_state(
        &self,
        thread_id: &str,
        state: HashMap<String, Value>,
        metadata: CheckpointMetadata,
    ) -> Result<Checkpoint>;

    async fn load_state(&self, thread_id: &str) -> Result<Checkpoint>;

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint>;

    async fn rollback(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint>;

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;
}

struct ThreadLog {
    /// All checkpoints ever saved for this thread, oldest first, with
    /// optional eviction once `max_per_thread` is exceeded.
    log: Vec<Checkpoint>,
    /// The checkpoint `SaveState` should chain its `parent_id` off next;
    /// distinct from `log.last()` once a `Rollback` has run.
    current_parent: Option<String>,
    next_version: u64,
}

impl ThreadLog {
    fn new() -> Self {
        Self {
            log: Vec::new(),
            current_parent: None,
            next_version: 1,
        }
    }
}

/// In-memory [`CheckpointStore`]. Enforces an optional per-thread maximum
/// with oldest-first eviction and is fully JSON-serializable via the
/// [`Checkpoint`] type it stores.
pub struct InMemoryCheckpointStore {
    threads: parking_lot::Mutex<HashMap<String, ThreadLog>>,
    max_per_thread: Option<usize>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            threads: parking_lot::Mutex::new(HashMap::new()),
            max_per_thread: None,
        }
    }

    pub fn with_max_per_thread(max: usize) -> Self {
        Self {
            threads: parking_lot::Mutex::new(HashMap::new()),
            max_per_thread: Some(max),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save_state(
        &self,
        thread_id: &str,
        state: HashMap<String, Value>,
        metadata: CheckpointMetadata,
    ) -> Result<Checkpoint> {
        let mut threads = self.threads.lock();
        let entry = threads
            .entry(thread_id.to_string())
            .or_insert_with(ThreadLog::new);

        let version = entry.next_version;
        let checkpoint = Checkpoint::new(
            thread_id,
            version,
            entry.current_parent.clone(),
            state,
            metadata,
        );
        entry.next_version += 1;
        entry.current_parent = Some(checkpoint.id.clone());
        entry.log.push(checkpoint.clone());

        if let Some(max) = self.max_per_thread {
            while entry.log.len() > max {
                entry.log.remove(0);
            }
        }

        debug!(thread = thread_id, checkpoint = %checkpoint.id, version, "checkpoint saved");
        Ok(checkpoint)
    }

    async fn load_state(&self, thread_id: &str) -> Result<Checkpoint> {
        let threads = self.threads.lock();
        let entry = threads
            .get(thread_id)
            .ok_or_else(|| CheckpointError::EmptyThread(thread_id.to_string()))?;
        let current_id = entry
            .current_parent
            .as_ref()
            .ok_or_else(|| CheckpointError::EmptyThread(thread_id.to_string()))?;
        entry
            .log
            .iter()
            .find(|c| &c.id == current_id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(current_id.clone(), thread_id.to_string()))
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        let threads = self.threads.lock();
        let entry = threads
            .get(thread_id)
            .ok_or_else(|| CheckpointError::EmptyThread(thread_id.to_string()))?;
        entry
            .log
            .iter()
            .find(|c| c.id == checkpoint_id)
            .cloned()
            .ok_or_else(|| {
                CheckpointError::NotFound(checkpoint_id.to_string(), thread_id.to_string())
            })
    }

    async fn rollback(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        let mut threads = self.threads.lock();
        let entry = threads
            .get_mut(thread_id)
            .ok_or_else(|| CheckpointError::EmptyThread(thread_id.to_string()))?;
        let target = entry
            .log
            .iter()
            .find(|c| c.id == checkpoint_id)
            .cloned()
            .ok_or_else(|| {
                CheckpointError::NotFound(checkpoint_id.to_string(), thread_id.to_string())
            })?;
        // Establish the rolled-back checkpoint as the parent for the next
        // save; history itself is untouched, so future saves branch here.
        entry.current_parent = Some(target.id.clone());
        debug!(thread = thread_id, checkpoint = %target.id, "rolled back");
        Ok(target)
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.lock();
        Ok(threads
            .get(thread_id)
            .map(|t| t.log.clone())
            .unwrap_or_default())
    }
}
