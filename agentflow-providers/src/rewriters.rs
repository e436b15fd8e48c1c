//! Core-mandated request rewriters.

use crate::error::Result;
use crate::gateway::RequestRewriter;
use agentflow_core::messages::ChatRequest;
use async_trait::async_trait;

/// Drops a stray `tool_choice` hint when the tool list is empty. Forwarding
/// `tool_choice` without `tools` is accepted by some backends and rejected
/// by others, so the gateway normalises it away before either case arises.
pub struct StripEmptyToolList;

#[async_trait]
impl RequestRewriter for StripEmptyToolList {
    async fn rewrite(&self, mut req: ChatRequest) -> Result<ChatRequest> {
        if req.tools.is_empty() {
            req.tool_choice = None;
        }
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::messages::{Message, ToolChoice};

    #[tokio::test]
    async fn clears_tool_choice_when_no_tools() {
        let mut req = ChatRequest::new("gpt", vec![Message::user("hi")]);
        req.tool_choice = Some(ToolChoice::Required);
        let rewritten = StripEmptyToolList.rewrite(req).await.unwrap();
        assert!(rewritten.tool_choice.is_none());
    }

    #[tokio::test]
    async fn leaves_tool_choice_when_tools_present() {
        use agentflow_core::messages::ToolSchema;
        let mut req = ChatRequest::new("gpt", vec![Message::user("hi")]).with_tools(vec![
            ToolSchema {
                name: "search".into(),
                description: "search the web".into(),
                parameters: serde_json::json!({}),
            },
        ]);
        req.tool_choice = Some(ToolChoice::Auto);
        let rewritten = StripEmptyToolList.rewrite(req).await.unwrap();
        assert_eq!(rewritten.tool_choice, Some(ToolChoice::Auto));
    }
}
