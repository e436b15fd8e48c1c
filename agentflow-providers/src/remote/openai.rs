//! OpenAI-style adapter: Chat Completions wire shape, modeled here as an
//! emulated-tool-calling backend to exercise the gateway's normalisation
//! of both native and emulated providers into the same response shape.

use crate::config::RemoteProviderConfig;
use crate::error::{ProviderError, Result};
use crate::gateway::{ChunkStream, CredentialOverride, HealthStatus, Provider};
use agentflow_core::error::AgentFlowError;
use agentflow_core::messages::{ChatRequest, ChatResponse, Choice, FinishReason, Message, Role, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub struct OpenAiProvider {
    config: RemoteProviderConfig,
    client: Client,
}

impl OpenAiProvider {
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
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    fn api_key(&self, credential: Option<&CredentialOverride>) -> &str {
        credential
            .and_then(|c| c.api_key.as_deref())
            .unwrap_or(&self.config.api_key)
    }

    fn convert_message(msg: &Message) -> OpenAiMessage {
        OpenAiMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string(),
            content: msg.content.clone(),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_native_tool_calling(&self) -> bool {
        false
    }

    async fn completion(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChatResponse> {
        let messages: Vec<OpenAiMessage> = req.messages.iter().map(Self::convert_message).collect();
        let body = OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: req.sampling.temperature,
            top_p: req.sampling.top_p,
            max_tokens: req.sampling.max_tokens,
            stop: if req.sampling.stop.is_empty() {
                None
            } else {
                Some(req.sampling.stop.clone())
            },
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint(credential))
            .bearer_auth(self.api_key(credential))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(AgentFlowError::from_http_status(status, &body_text, "openai").into());
        }

        let parsed: OpenAiResponse = response.json().await.map_err(ProviderError::Http)?;
        debug!(model = %self.config.model, tokens_in = parsed.usage.prompt_tokens, tokens_out = parsed.usage.completion_tokens, "openai completion");
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Upstream(AgentFlowError::new(
                agentflow_core::error::ErrorKind::UpstreamError,
                "openai response carried no choices",
            )))?;

        Ok(ChatResponse {
            id: parsed.id,
            provider: "openai".into(),
            model: self.config.model.clone(),
            choices: vec![Choice {
                index: 0,
                finish_reason: map_finish_reason(&choice.finish_reason),
                message: Message::assistant(choice.message.content.unwrap_or_default()),
            }],
            usage: Usage::new(parsed.usage.prompt_tokens, parsed.usage.completion_tokens),
        })
    }

    async fn stream(
        &self,
        _req: ChatRequest,
        _credential: Option<&CredentialOverride>,
    ) -> Result<ChunkStream> {
        Err(ProviderError::Upstream(AgentFlowError::new(
            agentflow_core::error::ErrorKind::InvalidRequest,
            "streaming not implemented for the openai adapter",
        )))
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let resp = self
            .client
            .get(format!("{}/models", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        Ok(HealthStatus {
            healthy: resp.status().is_success(),
            latency: start.elapsed(),
        })
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: String,
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_finish_reasons() {
        assert_eq!(map_finish_reason("stop"), FinishReason::Stop);
        assert_eq!(map_finish_reason("length"), FinishReason::Length);
        assert_eq!(map_finish_reason("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(map_finish_reason("content_filter"), FinishReason::ContentFilter);
    }

    #[test]
    fn converts_tool_message_with_call_id() {
        let msg = Message::tool("tc1", "result text");
        let converted = OpenAiProvider::convert_message(&msg);
        assert_eq!(converted.role, "tool");
        assert_eq!(converted.tool_call_id.as_deref(), Some("tc1"));
    }
}
