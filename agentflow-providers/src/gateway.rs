//! The uniform provider contract: `Completion`, `Stream`, `HealthCheck`, and
//! capability introspection, plus the per-call credential override and
//! request rewriter chain every call passes through first.

use crate::error::Result;
use agentflow_core::messages::{ChatRequest, ChatResponse, StreamChunk};
use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

/// A per-call credential override, superseding whatever the provider was
/// configured with when present.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverride {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub extras: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
}

/// A boxed stream of response chunks, the provider-side half of the
/// streaming contract: exactly one terminal chunk ends it, then the
/// stream is dropped.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider parses/emits tool calls in its own wire
    /// format (`true`) or needs prompt scaffolding from a caller (`false`).
    fn supports_native_tool_calling(&self) -> bool;

    async fn completion(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChatResponse>;

    async fn stream(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChunkStream>;

    async fn health_check(&self) -> Result<HealthStatus>;
}

/// A single step in the rewriter chain: `Request -> Request | err`. A
/// failure becomes an `invalid-request` error further up, never a silent
/// drop of the request.
#[async_trait]
pub trait RequestRewriter: Send + Sync {
    async fn rewrite(&self, req: ChatRequest) -> Result<ChatRequest>;
}

/// Runs a request through an ordered chain of rewriters before handing it
/// to a provider.
pub struct RewriterChain {
    rewriters: Vec<Box<dyn RequestRewriter>>,
}

impl RewriterChain {
    pub fn new() -> Self {
        Self {
            rewriters: Vec::new(),
        }
    }

    pub fn with(mut self, rewriter: Box<dyn RequestRewriter>) -> Self {
        self.rewriters.push(rewriter);
        self
    }

    pub async fn apply(&self, mut req: ChatRequest) -> Result<ChatRequest> {
        for rewriter in &self.rewriters {
            req = rewriter.rewrite(req).await?;
        }
        Ok(req)
    }
}

impl Default for RewriterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// A gateway pairs one [`Provider`] with the rewriter chain every outbound
/// request passes through first.
pub struct Gateway {
    provider: Box<dyn Provider>,
    rewriters: RewriterChain,
}

impl Gateway {
    pub fn new(provider: Box<dyn Provider>, rewriters: RewriterChain) -> Self {
        Self { provider, rewriters }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub async fn completion(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChatResponse> {
        let req = self.rewriters.apply(req).await?;
        self.provider.completion(req, credential).await
    }

    pub async fn stream(
        &self,
        req: ChatRequest,
        credential: Option<&CredentialOverride>,
    ) -> Result<ChunkStream> {
        let req = self.rewriters.apply(req).await?;
        self.provider.stream(req, credential).await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewriters::StripEmptyToolList;
    use agentflow_core::messages::{Message, ToolChoice};

    #[tokio::test]
    async fn rewriter_chain_runs_in_order() {
        let chain = RewriterChain::new().with(Box::new(StripEmptyToolList));
        let mut req = ChatRequest::new("gpt", vec![Message::user("hi")]);
        req.tool_choice = Some(ToolChoice::Required);
        let rewritten = chain.apply(req).await.unwrap();
        assert!(rewritten.tool_choice.is_none());
    }
}
