//! OpenAI-compatible chat-completion client for Ollama's `/v1` surface.

use super::retry::{RetryConfig, with_retry};
use super::{AssistantTurn, ChatProvider, ProposedToolCall, ToolDefinition, Usage};
use crate::cancel::CancelToken;
use crate::session::{Message, Role};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Chat-completion client bound to one base URL and model
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(base_url: &str, model: &str, timeout_seconds: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(anyhow!("LLM API request failed: server error {}: {}", status, body));
            }
            return Err(anyhow!("LLM API request failed: {}: {}", status, body));
        }

        response
            .json::<ChatResponse>()
            .await
            .context("malformed response from LLM endpoint")
    }
}

#[async_trait]
impl ChatProvider for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Transport-level failures (connect, timeout, 5xx) are retried with
    /// exponential backoff; everything else surfaces immediately.
    /// Cancellation aborts the in-flight request and any backoff wait.
    async fn chat(
        &self,
        ctx: &CancelToken,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(WireTool::from).collect(),
        };

        tracing::debug!(
            model = %self.model,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "LLM API request"
        );

        let started = std::time::Instant::now();
        let response = with_retry(RetryConfig::default(), ctx, is_retryable, || async {
            tokio::select! {
                result = self.send_once(&request) => result,
                _ = ctx.cancelled() => Err(anyhow!("request cancelled")),
            }
        })
        .await?;
        let duration = started.elapsed();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no response from LLM"))?;

        let turn = AssistantTurn {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ProposedToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect(),
            usage: response.usage.unwrap_or_default(),
        };

        tracing::debug!(
            duration_ms = duration.as_millis() as u64,
            prompt_tokens = turn.usage.prompt_tokens,
            completion_tokens = turn.usage.completion_tokens,
            tool_calls = turn.tool_calls.len(),
            "LLM API response"
        );

        Ok(turn)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("LLM request timeout: deadline exceeded")
    } else if e.is_connect() {
        anyhow!("connection refused: {}", e)
    } else {
        anyhow!("LLM API request failed: {}", e)
    }
}

fn is_retryable(e: &anyhow::Error) -> bool {
    let text = e.to_string();
    text.contains("timeout")
        || text.contains("connection refused")
        || text.contains("server error")
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            Some(
                msg.tool_calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: tc.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: tc.tool_name.clone(),
                            arguments: serde_json::to_string(&tc.parameters)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    })
                    .collect(),
            )
        };

        let tool_call_id = msg
            .metadata
            .get("tool_call_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            role: role.to_string(),
            content: msg.content.clone(),
            tool_calls,
            tool_call_id,
        }
    }
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function: WireFunction {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}
