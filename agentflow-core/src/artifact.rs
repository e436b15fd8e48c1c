//! Artifact store: ID-keyed, versioned, content-addressed blob storage.
//! The in-memory store here is a reference implementation; persistent
//! variants sit behind the same trait.

use crate::error::{AgentFlowError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    Uploading,
    Ready,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub artifact_type: String,
    pub status: ArtifactStatus,
    pub size: u64,
    pub checksum: String,
    pub storage_path: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub creator: Option<String>,
    pub session: Option<String>,
    pub parent_id: Option<String>,
    pub version: u32,
}

#[derive(Debug, Default, Clone)]
pub struct ArtifactQuery {
    pub session: Option<String>,
    pub artifact_type: Option<String>,
    pub status: Option<ArtifactStatus>,
    pub tags: Vec<String>,
    pub creator: Option<String>,
}

impl ArtifactQuery {
    fn matches(&self, a: &Artifact) -> bool {
        if let Some(s) = &self.session {
            if a.session.as_deref() != Some(s.as_str()) {
                return false;
            }
        }
        if let Some(t) = &self.artifact_type {
            if &a.artifact_type != t {
                return false;
            }
        }
        if let Some(status) = self.status {
            if a.status != status {
                return false;
            }
        }
        if let Some(c) = &self.creator {
            if a.creator.as_deref() != Some(c.as_str()) {
                return false;
            }
        }
        self.tags.iter().all(|t| a.tags.contains(t))
    }
}

/// In-memory artifact store. Bytes and metadata are stored together and
/// updated atomically under a single lock.
#[derive(Default)]
pub struct ArtifactStore {
    records: RwLock<HashMap<String, (Artifact, Vec<u8>)>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `data` fully, computes its checksum, and stores bytes + a new
    /// metadata record atomically.
    pub fn save(
        &self,
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        data: Vec<u8>,
        creator: Option<String>,
        session: Option<String>,
    ) -> Artifact {
        let checksum = sha256_hex(&data);
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let artifact = Artifact {
            id: id.clone(),
            name: name.into(),
            artifact_type: artifact_type.into(),
            status: ArtifactStatus::Ready,
            size: data.len() as u64,
            checksum,
            storage_path: format!("mem://{id}"),
            metadata: HashMap::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            expires_at: None,
            creator,
            session,
            parent_id: None,
            version: 1,
        };
        self.records
            .write()
            .insert(id.clone(), (artifact.clone(), data));
        artifact
    }

    pub fn load(&self, id: &str) -> Result<(Artifact, Vec<u8>)> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AgentFlowError::not_found(format!("artifact {id} not found")))
    }

    /// Creates a new version that inherits name/type/metadata/tags from
    /// `parent_id`, with `version = parent.version + 1`.
    pub fn create_version(&self, parent_id: &str, data: Vec<u8>) -> Result<Artifact> {
        let mut records = self.records.write();
        let (parent, _) = records
            .get(parent_id)
            .cloned()
            .ok_or_else(|| AgentFlowError::not_found(format!("artifact {parent_id} not found")))?;

        let checksum = sha256_hex(&data);
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let artifact = Artifact {
            id: id.clone(),
            name: parent.name.clone(),
            artifact_type: parent.artifact_type.clone(),
            status: ArtifactStatus::Ready,
            size: data.len() as u64,
            checksum,
            storage_path: format!("mem://{id}"),
            metadata: parent.metadata.clone(),
            tags: parent.tags.clone(),
            created_at: now,
            updated_at: now,
            expires_at: None,
            creator: parent.creator.clone(),
            session: parent.session.clone(),
            parent_id: Some(parent_id.to_string()),
            version: parent.version + 1,
        };
        records.insert(id.clone(), (artifact.clone(), data));
        Ok(artifact)
    }

    pub fn query(&self, q: &ArtifactQuery) -> Vec<Artifact> {
        self.records
            .read()
            .values()
            .filter(|(a, _)| q.matches(a))
            .map(|(a, _)| a.clone())
            .collect()
    }

    /// Deletes ready artifacts past their expiry, returning how many were
    /// removed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        let expired: Vec<String> = records
            .values()
            .filter(|(a, _)| {
                a.status == ArtifactStatus::Ready
                    && a.expires_at.map(|exp| exp <= now).unwrap_or(false)
            })
            .map(|(a, _)| a.id.clone())
            .collect();
        for id in &expired {
            records.remove(id);
        }
        expired.len()
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_bytes() {
        let store = ArtifactStore::new();
        let artifact = store.save("report.txt", "text", b"hello world".to_vec(), None, None);
        let (loaded, bytes) = store.load(&artifact.id).unwrap();
        assert_eq!(bytes, b"hello world");
        assert_eq!(loaded.checksum, artifact.checksum);
    }

    #[test]
    fn versions_increment_and_inherit() {
        let store = ArtifactStore::new();
        let v1 = store.save("report.txt", "text", b"v1".to_vec(), None, Some("s1".into()));
        let v2 = store.create_version(&v1.id, b"v2".to_vec()).unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_id.as_deref(), Some(v1.id.as_str()));
        assert_eq!(v2.session.as_deref(), Some("s1"));
    }

    #[test]
    fn query_filters_by_session_and_tags() {
        let store = ArtifactStore::new();
        let a = store.save("a", "text", b"x".to_vec(), None, Some("s1".into()));
        store.save("b", "text", b"y".to_vec(), None, Some("s2".into()));
        let results = store.query(&ArtifactQuery {
            session: Some("s1".into()),
            ..Default::default()
        });
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, a.id);
    }

    #[test]
    fn cleanup_removes_expired_ready_artifacts() {
        let store = ArtifactStore::new();
        let a = store.save("a", "text", b"x".to_vec(), None, None);
        {
            let mut records = store.records.write();
            records.get_mut(&a.id).unwrap().0.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        }
        let removed = store.cleanup_expired(Utc::now());
        assert_eq!(removed, 1);
        assert!(store.load(&a.id).is_err());
    }
}
