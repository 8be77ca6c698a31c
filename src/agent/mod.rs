//! Agent orchestration
//!
//! The agent owns the multi-turn loop: send the conversation to the model,
//! execute any proposed tool calls through the approval gate, feed results
//! back, and iterate until the model stops calling tools or the iteration
//! cap fires.

use crate::approval::ApprovalEngine;
use crate::cancel::CancelToken;
use crate::provider::ChatProvider;
use crate::session::context::ContextManager;
use crate::session::{Message, Session, SessionStatus, SessionStore, ToolCall};
use crate::tool::{ToolParams, ToolRegistry, ToolResult};
use crate::ui::{self, Formatter};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;

/// Upper bound on assistant turns per invocation. Bounds runaway tool loops;
/// hitting it is non-fatal since the session persists and can be continued.
const MAX_ITERATIONS: usize = 10;

/// Orchestrates the interaction between user, model, and tools
pub struct Agent {
    llm: Box<dyn ChatProvider>,
    tools: ToolRegistry,
    approval: ApprovalEngine,
    sessions: SessionStore,
    context: ContextManager,
    formatter: Formatter,
    cancel: CancelToken,
}

impl Agent {
    pub fn new(
        llm: Box<dyn ChatProvider>,
        tools: ToolRegistry,
        approval: ApprovalEngine,
        sessions: SessionStore,
        context: ContextManager,
        formatter: Formatter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            llm,
            tools,
            approval,
            sessions,
            context,
            formatter,
            cancel,
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Run one invocation: load or create a session, append the user turn,
    /// and drive the loop to completion.
    pub async fn run(
        &mut self,
        prompt: &str,
        working_dir: &Path,
        continue_session: bool,
    ) -> Result<()> {
        let working_dir = working_dir
            .canonicalize()
            .with_context(|| format!("working directory '{}' is unavailable", working_dir.display()))?;

        let mut session = if continue_session {
            let session = self
                .sessions
                .latest()
                .context("failed to load previous session")?;
            tracing::info!(session_id = %session.id, "continuing session");
            ui::print_info(&format!("Continuing session: {}", &session.id[..8]));
            session
        } else {
            let session = self.sessions.create(&working_dir, self.llm.model())?;
            tracing::info!(session_id = %session.id, "created new session");
            session
        };

        if !prompt.is_empty() {
            self.context.add_message(&mut session, Message::user(prompt));
        }

        let outcome = self.run_loop(&mut session).await;

        // Interruption is a pause, not a failure: the session resumes with
        // --continue, and an error raced by ctrl-c is not surfaced.
        let cancelled = self.cancel.is_cancelled();
        session.status = match &outcome {
            _ if cancelled => SessionStatus::Paused,
            Ok(()) => SessionStatus::Completed,
            Err(_) => SessionStatus::Errored,
        };
        if let Err(e) = self.sessions.save(&mut session) {
            tracing::warn!(error = %e, "failed to save final session");
        }

        ui::print_info(
            &self
                .formatter
                .format_session_info(&session.id, session.messages.len()),
        );

        if cancelled { Ok(()) } else { outcome }
    }

    async fn run_loop(&mut self, session: &mut Session) -> Result<()> {
        let tool_definitions = self.tools.definitions();

        for iteration in 0..MAX_ITERATIONS {
            if self.cancel.is_cancelled() {
                tracing::info!(iteration, "cancelled, pausing session");
                return Ok(());
            }
            tracing::debug!(iteration, "agent iteration");

            let turn = self
                .llm
                .chat(&self.cancel, &session.messages, &tool_definitions)
                .await
                .map_err(|e| self.rewrite_transport_error(e))?;

            // Split proposals into parseable calls and malformed ones; the
            // latter are hard per-call failures the model can self-correct on
            // the next turn.
            let mut calls: Vec<ToolCall> = Vec::new();
            let mut malformed: Vec<(String, String)> = Vec::new();
            for proposal in &turn.tool_calls {
                match serde_json::from_str::<ToolParams>(&proposal.arguments) {
                    Ok(parameters) => calls.push(ToolCall {
                        id: proposal.id.clone(),
                        tool_name: proposal.name.clone(),
                        parameters,
                    }),
                    Err(e) => {
                        tracing::error!(
                            tool = %proposal.name,
                            error = %e,
                            "failed to parse tool parameters"
                        );
                        malformed.push((
                            proposal.id.clone(),
                            format!("invalid tool parameters for '{}': {}", proposal.name, e),
                        ));
                    }
                }
            }

            self.context
                .add_message(session, Message::assistant(turn.content.as_str(), calls.clone()));

            if !turn.has_tool_calls() {
                if !turn.content.is_empty() {
                    ui::print_output(&self.formatter.format_message(&turn.content));
                }
                return Ok(());
            }

            for (call_id, error) in malformed {
                let mut result = ToolResult::error(error);
                result.tool_call_id = call_id;
                self.record_result(session, result);
            }

            for call in calls {
                let result = self.execute_tool_call(session, &call).await;
                self.record_result(session, result);
            }

            if let Err(e) = self.sessions.save(session) {
                tracing::warn!(error = %e, "failed to save session");
            }
        }

        tracing::warn!(max_iterations = MAX_ITERATIONS, "iteration cap reached");
        ui::print_warning(&format!(
            "Reached the {} iteration limit; use 'wink --continue' to keep going.",
            MAX_ITERATIONS
        ));
        Ok(())
    }

    /// Gate one call through approval, then validate and execute it. Every
    /// failure shape lands in a ToolResult so the loop keeps going.
    async fn execute_tool_call(&mut self, session: &Session, call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %call.tool_name, tool_call_id = %call.id, "executing tool call");

        let tool = match self.tools.get(&call.tool_name) {
            Some(tool) => tool,
            None => {
                let mut result = ToolResult::error(format!("tool '{}' not found", call.tool_name));
                result.tool_call_id = call.id.clone();
                return result;
            }
        };

        let decision = match self.approval.check(tool.as_ref(), &call.parameters) {
            Ok(d) => d,
            Err(e) => {
                let mut result = ToolResult::error(format!("approval check failed: {}", e));
                result.tool_call_id = call.id.clone();
                return result;
            }
        };

        if !decision.approved {
            let mut result = ToolResult::error("Operation rejected by user");
            result.tool_call_id = call.id.clone();
            return result;
        }

        if decision.auto_approved {
            ui::print_info(
                &self
                    .formatter
                    .format_auto_approval(&call.tool_name, &decision.rule_description),
            );
        }

        let started = Instant::now();
        let mut result = match self
            .tools
            .execute(&self.cancel, &call.tool_name, &call.parameters, &session.working_dir)
            .await
        {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()).timed(started),
        };
        result.tool_call_id = call.id.clone();
        if decision.auto_approved {
            result
                .metadata
                .insert("auto_approved".to_string(), serde_json::json!(true));
        }
        result
    }

    /// Append a result both as structured record and as a tool message the
    /// model will see on the next turn.
    fn record_result(&self, session: &mut Session, result: ToolResult) {
        let content = if result.success {
            result.output.clone()
        } else {
            format!("Error: {}", result.error)
        };
        let tool_message = Message::tool(content, &result.tool_call_id);

        ui::print_info(&self.formatter.format_tool_result(&result));

        self.context.add_tool_result(session, result);
        self.context.add_message(session, tool_message);
    }

    /// Map transport failures to one actionable line; the original cause
    /// stays in the chain for --debug output.
    fn rewrite_transport_error(&self, e: anyhow::Error) -> anyhow::Error {
        let text = e.to_string();
        let model = self.llm.model().to_string();
        let base_url = self.llm.base_url().to_string();

        if text.contains("connection refused") || text.contains("no such host") || text.contains("dns error") {
            return e.context(format!(
                "unable to connect to LLM server at {}. Please ensure Ollama is running with 'ollama serve'",
                base_url
            ));
        }
        if text.contains("model") && text.contains("not found") {
            return e.context(format!(
                "model '{}' not found. Try pulling it with: ollama pull {}",
                model, model
            ));
        }
        if text.contains("timeout") || text.contains("deadline exceeded") {
            return e.context(
                "LLM request timed out. The server may be overloaded or the request too complex",
            );
        }
        e.context(
            "LLM request failed. Try:\n  - Ensure Ollama is running: ollama serve\n  - Check model is available: ollama list\n  - Use --debug flag for detailed logs",
        )
    }
}
