//! Tool system
//!
//! Tools are the executable capabilities the agent can offer to the model.
//! Every tool validates its parameters against the session's working
//! directory before it runs; paths funnel through [`path::resolve_path`].

pub mod dir;
pub mod file;
pub mod path;
pub mod search;
pub mod terminal;
pub mod web;

use crate::cancel::CancelToken;
use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Risk category of a tool operation, shown in the approval prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only operations
    ReadOnly,
    /// Creates new files/directories, never modifies existing ones
    SafeWrite,
    /// Modifies existing files, executes commands, network access
    Dangerous,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::ReadOnly => "read_only",
            RiskLevel::SafeWrite => "safe_write",
            RiskLevel::Dangerous => "dangerous",
        };
        f.write_str(s)
    }
}

/// Parameters as the model sends them: a JSON object.
pub type ToolParams = Map<String, Value>;

/// A capability available to the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique identifier, also the function name exposed to the model
    fn name(&self) -> &str;

    /// What this tool does (for the model and for users)
    fn description(&self) -> &str;

    /// JSON Schema for the parameters
    fn parameters_schema(&self) -> Value;

    /// Check parameters before execution; path checks happen here
    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()>;

    /// Run the tool. Long-running tools race their external work against
    /// `ctx` so cancellation aborts the call in flight.
    async fn execute(
        &self,
        ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult>;

    /// Whether the approval gate applies to this tool
    fn requires_approval(&self) -> bool {
        true
    }

    /// Risk category for the approval prompt
    fn risk_level(&self) -> RiskLevel;
}

/// Result from executing a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub tool_call_id: String,
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_affected: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            tool_call_id: String::new(),
            success: true,
            output: output.into(),
            error: String::new(),
            execution_time_ms: 0,
            files_affected: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: String::new(),
            success: false,
            output: message.clone(),
            error: message,
            execution_time_ms: 0,
            files_affected: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files_affected = files;
        self
    }

    pub fn timed(mut self, started: Instant) -> Self {
        self.execution_time_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Duplicate names are rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.get(tool.name()).is_some() {
            bail!("tool '{}' is already registered", tool.name());
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function definitions exposed to the model, in registration order
    pub fn definitions(&self) -> Vec<crate::provider::ToolDefinition> {
        self.tools
            .iter()
            .map(|t| crate::provider::ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Validate and execute a tool by name. Validation and execution errors
    /// come back as failed results so the agent loop can feed them to the
    /// model instead of aborting.
    pub async fn execute(
        &self,
        ctx: &CancelToken,
        name: &str,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let tool = match self.get(name) {
            Some(t) => t,
            None => bail!("tool '{}' not found", name),
        };

        if let Err(e) = tool.validate(params, working_dir) {
            return Ok(ToolResult::error(e.to_string()).timed(started));
        }

        match tool.execute(ctx, params, working_dir).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(ToolResult::error(e.to_string()).timed(started)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a required string parameter.
pub(crate) fn require_str<'a>(params: &'a ToolParams, key: &str) -> Result<&'a str> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => bail!("{} parameter is required and must be a non-empty string", key),
    }
}

/// Read an optional integer parameter, enforcing an inclusive range.
pub(crate) fn optional_int(
    params: &ToolParams,
    key: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .ok_or_else(|| anyhow::anyhow!("{} must be an integer", key))?;
            if n < min || n > max {
                bail!("{} must be between {} and {}", key, min, max);
            }
            Ok(Some(n))
        }
    }
}
