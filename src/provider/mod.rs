//! LLM transport abstraction
//!
//! The agent talks to a chat-completion endpoint with function-calling
//! semantics: it sends the conversation plus tool schemas and receives an
//! assistant turn carrying text and zero or more proposed tool calls.

pub mod ollama;
pub mod retry;

use crate::cancel::CancelToken;
use crate::session::Message;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function definition exposed to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema
    pub parameters: Value,
}

/// A tool call as proposed by the model: arguments arrive as a JSON string
/// and are parsed (and possibly rejected) by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One response from the model
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ProposedToolCall>,
    pub usage: Usage,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The transport the agent drives. The production implementation is
/// [`ollama::LlmClient`]; tests substitute a scripted provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model name, used for session records and error guidance
    fn model(&self) -> &str;

    /// Endpoint base, used for error guidance
    fn base_url(&self) -> &str;

    /// Send the conversation plus tool schemas; receive one assistant turn.
    /// Cancellation aborts the request in flight, including retry waits.
    async fn chat(
        &self,
        ctx: &CancelToken,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn>;
}
