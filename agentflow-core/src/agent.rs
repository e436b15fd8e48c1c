//! Agent identity, configuration, and lifecycle state machine.
//!
//! Legal transitions:
//!
//! ```text
//! init      -> { ready, failed }
//! ready     -> { running, failed }
//! running   -> { ready, paused, completed, failed }
//! paused    -> { running, completed, failed }
//! completed -> { ready }                   // re-schedule
//! failed    -> { ready, init }             // retry or reset
//! ```
//!
//! Any pair not in this table is rejected with
//! [`AgentFlowError::invalid_transition`].

use crate::error::{AgentFlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Init,
    Ready,
    Running,
    Paused,
    Completed,
    Failed,
}

impl AgentState {
    fn legal_targets(self) -> &'static [AgentState] {
        use AgentState::*;
        match self {
            Init => &[Ready, Failed],
            Ready => &[Running, Failed],
            Running => &[Ready, Paused, Completed, Failed],
            Paused => &[Running, Completed, Failed],
            Completed => &[Ready],
            Failed => &[Ready, Init],
        }
    }

    pub fn can_transition_to(self, target: AgentState) -> bool {
        self.legal_targets().contains(&target)
    }
}

/// A long-lived configured agent: model, prompt bundle, tools, lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    state: AgentState,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        agent_type: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent_type: agent_type.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            state: AgentState::Init,
            config: HashMap::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Attempts the transition against the legal-transition table. Returns
    /// `InvalidTransition` with both states recorded for anything not in
    /// the table.
    pub fn transition(&mut self, target: AgentState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            debug!(agent = %self.id, from = ?self.state, to = ?target, "rejected illegal agent transition");
            return Err(AgentFlowError::invalid_transition(self.state, target));
        }
        debug!(agent = %self.id, from = ?self.state, to = ?target, "agent transition");
        self.state = target;
        Ok(())
    }
}

/// The workflow engine drives agents through this capability rather than
/// importing any concrete agent type.
#[async_trait::async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value>;
}
