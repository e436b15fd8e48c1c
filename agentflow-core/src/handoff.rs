//! Handoff manager: capability registry, routing, and the
//! accept/execute/timeout protocol.

use crate::error::{AgentFlowError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub task_types: Vec<String>,
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_type: String,
    pub description: String,
    pub input: serde_json::Value,
    pub priority: u32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Failed,
    Rejected,
}

impl HandoffStatus {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            HandoffStatus::Completed | HandoffStatus::Failed | HandoffStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub id: String,
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub task: Task,
    pub status: HandoffStatus,
    pub context: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timeout: Duration,
    pub retries: u32,
}

impl Handoff {
    /// Moves `status` forward. Once terminal, the status never changes
    /// again.
    fn set_status(&mut self, status: HandoffStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
    }
}

/// The two verbs every registered agent implements for handoff.
#[async_trait]
pub trait HandoffAgent: Send + Sync {
    fn can_handle(&self, task: &Task) -> bool;
    async fn accept_handoff(&self, handoff: &Handoff) -> Result<()>;
    async fn execute_handoff(&self, handoff: &Handoff) -> Result<serde_json::Value>;
}

struct Registration {
    agent_id: String,
    capabilities: Vec<Capability>,
    agent: Arc<dyn HandoffAgent>,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Registers agents by capability and routes/executes handoffs between them.
pub struct HandoffManager {
    registrations: RwLock<Vec<Registration>>,
    handoffs: Arc<RwLock<HashMap<String, Handoff>>>,
}

impl Default for HandoffManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoffManager {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            handoffs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register(
        &self,
        agent_id: impl Into<String>,
        capabilities: Vec<Capability>,
        agent: Arc<dyn HandoffAgent>,
    ) {
        self.registrations.write().push(Registration {
            agent_id: agent_id.into(),
            capabilities,
            agent,
        });
    }

    /// Routes a task to `to_agent_id` if given, otherwise picks the
    /// registered agent that can handle it with the highest-priority
    /// matching capability (ties broken by registration order).
    fn route(&self, to_agent_id: Option<&str>, task: &Task) -> Result<String> {
        let regs = self.registrations.read();
        if let Some(id) = to_agent_id {
            if regs.iter().any(|r| r.agent_id == id) {
                return Ok(id.to_string());
            }
            return Err(AgentFlowError::not_found(format!("agent {id} not registered")));
        }

        let mut best: Option<(&Registration, u32)> = None;
        for reg in regs.iter() {
            if !reg.agent.can_handle(task) {
                continue;
            }
            let top_priority = reg
                .capabilities
                .iter()
                .map(|c| c.priority)
                .max()
                .unwrap_or(0);
            if best.map(|(_, p)| top_priority > p).unwrap_or(true) {
                best = Some((reg, top_priority));
            }
        }
        best.map(|(r, _)| r.agent_id.clone())
            .ok_or_else(|| AgentFlowError::not_found("no agent can handle this task"))
    }

    fn find_agent(&self, agent_id: &str) -> Option<Arc<dyn HandoffAgent>> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.agent_id == agent_id)
            .map(|r| r.agent.clone())
    }

    /// Runs the full pending -> accepted -> in_progress -> completed|failed
    /// protocol. If `wait` is true, blocks on completion, the handoff's
    /// timeout, or `cancel`, whichever comes first.
    pub async fn handoff(
        &self,
        from_agent_id: impl Into<String>,
        to_agent_id: Option<&str>,
        task: Task,
        context: serde_json::Value,
        timeout: Option<Duration>,
        wait: bool,
    ) -> Result<Handoff> {
        let to_agent_id = self.route(to_agent_id, &task)?;
        let agent = self
            .find_agent(&to_agent_id)
            .ok_or_else(|| AgentFlowError::not_found(format!("agent {to_agent_id} not found")))?;

        let id = uuid::Uuid::new_v4().to_string();
        let mut handoff = Handoff {
            id: id.clone(),
            from_agent_id: from_agent_id.into(),
            to_agent_id: to_agent_id.clone(),
            task,
            status: HandoffStatus::Pending,
            context,
            result: None,
            created_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            retries: 0,
        };

        if let Err(e) = agent.accept_handoff(&handoff).await {
            warn!(handoff = %id, to = %to_agent_id, error = %e, "handoff rejected");
            handoff.set_status(HandoffStatus::Rejected);
            self.handoffs.write().insert(id, handoff);
            return Err(e);
        }
        debug!(handoff = %id, from = %handoff.from_agent_id, to = %to_agent_id, "handoff accepted");
        handoff.set_status(HandoffStatus::Accepted);
        handoff.accepted_at = Some(Utc::now());
        self.handoffs.write().insert(id.clone(), handoff.clone());

        let (tx, rx) = oneshot::channel();
        let agent_for_task = agent.clone();
        let handoff_for_task = handoff.clone();
        let handoffs = self.handoffs.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            {
                let mut map = handoffs.write();
                if let Some(h) = map.get_mut(&id_for_task) {
                    h.set_status(HandoffStatus::InProgress);
                }
            }
            let outcome = agent_for_task.execute_handoff(&handoff_for_task).await;
            let mut map = handoffs.write();
            if let Some(h) = map.get_mut(&id_for_task) {
                match &outcome {
                    Ok(result) => {
                        h.result = Some(result.clone());
                        h.set_status(HandoffStatus::Completed);
                    }
                    Err(_) => h.set_status(HandoffStatus::Failed),
                }
                h.completed_at = Some(Utc::now());
            }
            let _ = tx.send(outcome);
        });

        if !wait {
            return Ok(self.handoffs.read().get(&id).cloned().unwrap());
        }

        let timeout_dur = handoff.timeout;
        match tokio::time::timeout(timeout_dur, rx).await {
            Ok(Ok(Ok(_))) | Ok(Ok(Err(_))) => {
                Ok(self.handoffs.read().get(&id).cloned().unwrap())
            }
            Ok(Err(_)) => Ok(self.handoffs.read().get(&id).cloned().unwrap()),
            Err(_) => {
                // Timed out: the spawned task keeps running (the agent owns
                // its own cancellation), but the record is marked failed.
                warn!(handoff = %id, timeout = ?timeout_dur, "handoff timed out");
                let mut map = self.handoffs.write();
                if let Some(h) = map.get_mut(&id) {
                    h.set_status(HandoffStatus::Failed);
                    h.completed_at = Some(Utc::now());
                }
                Err(AgentFlowError::timeout(format!(
                    "handoff {id} timed out after {timeout_dur:?}"
                )))
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Handoff> {
        self.handoffs.read().get(id).cloned()
    }
}
