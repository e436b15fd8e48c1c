//! Anthropic Claude adapter: native tool calling, Messages API wire shape.

use crate::config::RemoteProviderConfig;
use crate::error::{ProviderError, Result};
use crate::gateway::{ChunkStream, CredentialOverride, HealthStatus, Provider};
use agentflow_core::error::AgentFlowError;
use agentflow_core::messages::{
    ChatRequest, ChatResponse, Choice, FinishReason, Message, Role, ToolCall, ToolChoice,
    ToolSchema, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    config: RemoteProviderConfig,
    client: Client,
}

impl ClaudeProvider {
    pub fn new(config: RemoteProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest client");
        Self { config, client }
    }

    fn endpoint(&self, credential: Option<&CredentialOverride>) -> String {
        let base = credential
            .and_then(|c| c.base_url.as_deref())
            .unwrap_or(&self.config.base_url);
        format!("{base}/v1/messages")
    }

    fn api_key(&self, credential: Option<&CredentialOverride>) -> &str {
        credential
            .and_then(|c| c.api_key.as_deref())
            .unwrap_or(&self.config.api_key)
    }

    /// Claude requires system messages split out of the conversation array.
    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<ClaudeMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut out = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => {
                    system_prompt = Some(match system_prompt.take() {
                        Some(existing) => format!("{existing}\n\n{}", msg.content),
                        None => msg.content.clone(),
                    });
                }
                Role::User => out.push(ClaudeMessage {
                    role: "user".into(),
                    content: msg.content.clone(),
                }),
                Role::Assistant => out.push(ClaudeMessage {
                    role: "assistant".into(),
                    content: msg.content.clone(),
                }),
                Role::Tool => out.push(ClaudeMessage {
                    role: "user".into(),
                    content: format!("[tool result] {}", msg.content),
                }),
            }
        }
        (system_prompt, out)
    }

    fn convert_tools(tools: &[ToolSchema]) -> Option<Vec<ClaudeTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|t| ClaudeTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect(),
        )
    }

    fn convert_tool_choice(choice: Option<ToolChoice>) -> Option<ClaudeToolChoice> {
        match choice? {
            ToolChoice::Auto => Some(ClaudeToolChoice { choice_type: "auto" }),
            ToolChoice::Required => Some(ClaudeToolChoice { choice_type: "any" }),
            ToolChoice::None => None,
        }
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn supports_native_tool_calling(&self) -> bool {
        true
    }

    async fn completion(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChatResponse> {
        let (system, messages) = self.convert_messages(&req.messages);
        let body = ClaudeRequest {
            model: self.config.model.clone(),
            messages,
            system,
            max_tokens: req.sampling.max_tokens.unwrap_or(4096),
            temperature: req.sampling.temperature,
            top_p: req.sampling.top_p,
            stop_sequences: if req.sampling.stop.is_empty() {
                None
            } else {
                Some(req.sampling.stop.clone())
            },
            stream: false,
            tools: Self::convert_tools(&req.tools),
            tool_choice: Self::convert_tool_choice(req.tool_choice),
        };

        let response = self
            .client
            .post(self.endpoint(credential))
            .header("x-api-key", self.api_key(credential))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(AgentFlowError::from_http_status(status, &body_text, "claude").into());
        }

        let parsed: ClaudeResponse = response.json().await.map_err(ProviderError::Http)?;
        debug!(model = %self.config.model, tokens_in = parsed.usage.input_tokens, tokens_out = parsed.usage.output_tokens, "claude completion");
        let text = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.clone())
            .collect::<Vec<_>>()
            .join("");

        let tool_calls: Vec<ToolCall> = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "tool_use")
            .filter_map(|b| {
                Some(ToolCall {
                    id: b.id.clone()?,
                    name: b.name.clone()?,
                    arguments: b.input.clone().unwrap_or(serde_json::Value::Null),
                })
            })
            .collect();

        let mut message = Message::assistant(text);
        if !tool_calls.is_empty() {
            message = message.with_tool_calls(tool_calls);
        }

        Ok(ChatResponse {
            id: parsed.id,
            provider: "claude".into(),
            model: self.config.model.clone(),
            choices: vec![Choice {
                index: 0,
                finish_reason: map_stop_reason(parsed.stop_reason.as_deref()),
                message,
            }],
            usage: Usage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }

    async fn stream(
        &self,
        _req: ChatRequest,
        _credential: Option<&CredentialOverride>,
    ) -> Result<ChunkStream> {
        Err(ProviderError::Upstream(AgentFlowError::new(
            agentflow_core::error::ErrorKind::InvalidRequest,
            "streaming not implemented for the claude adapter",
        )))
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let resp = self
            .client
            .get(format!(
                "{}/v1/models",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await?;
        Ok(HealthStatus {
            healthy: resp.status().is_success(),
            latency: start.elapsed(),
        })
    }
}

fn map_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ClaudeToolChoice>,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ClaudeToolChoice {
    #[serde(rename = "type")]
    choice_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    id: String,
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}
