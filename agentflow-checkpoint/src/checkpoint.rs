//! Core checkpoint data structures: a point-in-time snapshot of a thread's
//! variable state, versioned and append-only.
//!
//! The checkpoint log per thread forms a DAG — usually a chain, but
//! `Rollback` creates branches by pointing a new checkpoint's `parent_id`
//! back into history without ever rewriting a prior entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Additional context recorded alongside a checkpoint's state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub step: Option<u64>,
    pub node_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A single versioned state snapshot for a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub thread_id: String,
    pub version: u64,
    pub parent_id: Option<String>,
    pub state: HashMap<String, Value>,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        version: u64,
        parent_id: Option<String>,
        state: HashMap<String, Value>,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            version,
            parent_id,
            state,
            metadata,
            created_at: Utc::now(),
        }
    }
}
