//! Terminal tools: run_in_terminal, terminal_last_command, and the
//! session-scoped command history that links them.

use super::{RiskLevel, Tool, ToolParams, ToolResult, optional_int, require_str};
use crate::cancel::CancelToken;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

/// Per-stream output cap (100 KiB)
const MAX_OUTPUT_SIZE: usize = 100 * 1024;
const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// A command that was run
#[derive(Debug, Clone)]
pub struct ExecutedCommand {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub executed_at: DateTime<Utc>,
}

/// Commands executed during this process, shared by the two terminal tools.
/// Not persisted across runs. Tool calls are sequential, but the mutex is
/// kept so the history is safe to share regardless.
#[derive(Default)]
pub struct CommandHistory {
    commands: Mutex<Vec<ExecutedCommand>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, cmd: ExecutedCommand) {
        self.commands.lock().expect("command history lock").push(cmd);
    }

    pub fn last(&self) -> Option<ExecutedCommand> {
        self.commands.lock().expect("command history lock").last().cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().expect("command history lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Platform shell and its command flag(s). Windows prefers PowerShell Core,
/// then Windows PowerShell, then cmd.
#[cfg(windows)]
fn detect_shell() -> (&'static str, Vec<&'static str>) {
    fn on_path(name: &str) -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
            .unwrap_or(false)
    }
    if on_path("pwsh.exe") {
        return ("pwsh.exe", vec!["-NoProfile", "-Command"]);
    }
    if on_path("powershell.exe") {
        return ("powershell.exe", vec!["-NoProfile", "-Command"]);
    }
    ("cmd.exe", vec!["/C"])
}

#[cfg(not(windows))]
fn detect_shell() -> (&'static str, Vec<&'static str>) {
    ("sh", vec!["-c"])
}

fn truncate_stream(s: String) -> (String, bool) {
    if s.len() > MAX_OUTPUT_SIZE {
        let mut cut = MAX_OUTPUT_SIZE;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        (format!("{}\n... (output truncated)", &s[..cut]), true)
    } else {
        (s, false)
    }
}

/// Execute a shell command with a timeout
pub struct RunInTerminalTool {
    history: Arc<CommandHistory>,
}

impl RunInTerminalTool {
    pub fn new(history: Arc<CommandHistory>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Tool for RunInTerminalTool {
    fn name(&self) -> &str {
        "run_in_terminal"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the terminal"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 30)",
                    "default": 30
                }
            },
            "required": ["command"]
        })
    }

    fn validate(&self, params: &ToolParams, _working_dir: &Path) -> Result<()> {
        require_str(params, "command")?;
        optional_int(params, "timeout_seconds", 1, 300)?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let started_at = Utc::now();
        let command = require_str(params, "command")?.trim().to_string();
        let timeout_secs =
            optional_int(params, "timeout_seconds", 1, 300)?.unwrap_or(DEFAULT_TIMEOUT_SECS) as u64;

        let (shell, shell_args) = detect_shell();
        tracing::debug!(%shell, %command, timeout_secs, "run_in_terminal");

        let mut cmd = Command::new(shell);
        cmd.args(&shell_args)
            .arg(&command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Racing against cancellation drops the output future, and
        // kill_on_drop reaps the child, so ctrl-c aborts the command itself.
        let result = tokio::select! {
            result = timeout(Duration::from_secs(timeout_secs), cmd.output()) => result,
            _ = ctx.cancelled() => {
                self.history.add(ExecutedCommand {
                    command: command.clone(),
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: "command cancelled".to_string(),
                    executed_at: started_at,
                });
                return Ok(ToolResult::error("Command cancelled")
                    .with_metadata("command", json!(command))
                    .timed(started));
            }
        };

        match result {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let (stdout, stdout_truncated) =
                    truncate_stream(String::from_utf8_lossy(&output.stdout).into_owned());
                let (stderr, stderr_truncated) =
                    truncate_stream(String::from_utf8_lossy(&output.stderr).into_owned());

                self.history.add(ExecutedCommand {
                    command: command.clone(),
                    exit_code,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                    executed_at: started_at,
                });

                let mut text = format!("Command: {}\nExit code: {}\n", command, exit_code);
                if !stdout.is_empty() {
                    text.push_str("\nStdout:\n");
                    text.push_str(&stdout);
                }
                if !stderr.is_empty() {
                    text.push_str("\nStderr:\n");
                    text.push_str(&stderr);
                }

                let success = output.status.success();
                tracing::debug!(exit_code, success, "run_in_terminal finished");

                let mut result = ToolResult {
                    tool_call_id: String::new(),
                    success,
                    output: text,
                    error: if success {
                        String::new()
                    } else {
                        format!("command exited with code {}", exit_code)
                    },
                    execution_time_ms: 0,
                    files_affected: Vec::new(),
                    metadata: Default::default(),
                };
                result = result
                    .with_metadata("exit_code", json!(exit_code))
                    .with_metadata("stdout_lines", json!(stdout.split('\n').count()))
                    .with_metadata("stderr_lines", json!(stderr.split('\n').count()))
                    .with_metadata("command", json!(command));
                if stdout_truncated || stderr_truncated {
                    result = result.with_metadata("truncated", json!(true));
                }
                Ok(result.timed(started))
            }
            Ok(Err(e)) => {
                self.history.add(ExecutedCommand {
                    command: command.clone(),
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    executed_at: started_at,
                });
                Ok(ToolResult::error(format!("Command failed: {}", e)).timed(started))
            }
            Err(_) => {
                // Timed out; kill_on_drop reaps the child.
                self.history.add(ExecutedCommand {
                    command: command.clone(),
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("timed out after {} seconds", timeout_secs),
                    executed_at: started_at,
                });
                Ok(ToolResult::error(format!(
                    "Command timed out after {} seconds",
                    timeout_secs
                ))
                .with_metadata("command", json!(command))
                .with_metadata("timeout_seconds", json!(timeout_secs))
                .timed(started))
            }
        }
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Dangerous
    }
}

/// Retrieve the last executed shell command
pub struct TerminalLastCommandTool {
    history: Arc<CommandHistory>,
}

impl TerminalLastCommandTool {
    pub fn new(history: Arc<CommandHistory>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Tool for TerminalLastCommandTool {
    fn name(&self) -> &str {
        "terminal_last_command"
    }

    fn description(&self) -> &str {
        "Retrieve the last shell command that was executed"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn validate(&self, _params: &ToolParams, _working_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &CancelToken,
        _params: &ToolParams,
        _working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let last = match self.history.last() {
            Some(cmd) => cmd,
            None => {
                return Ok(ToolResult {
                    tool_call_id: String::new(),
                    success: false,
                    output: "No previous command in this session".to_string(),
                    error: "no command history".to_string(),
                    execution_time_ms: 0,
                    files_affected: Vec::new(),
                    metadata: Default::default(),
                }
                .timed(started));
            }
        };

        let mut text = format!(
            "Last command: {}\nExecuted at: {}\nExit code: {}\n",
            last.command,
            last.executed_at.to_rfc3339(),
            last.exit_code
        );
        if !last.stdout.is_empty() {
            text.push_str("\nStdout:\n");
            text.push_str(&last.stdout);
        }
        if !last.stderr.is_empty() {
            text.push_str("\nStderr:\n");
            text.push_str(&last.stderr);
        }

        Ok(ToolResult::success(text)
            .with_metadata("command", json!(last.command))
            .with_metadata("exit_code", json!(last.exit_code))
            .with_metadata("executed_at", json!(last.executed_at.to_rfc3339()))
            .timed(started))
    }

    fn requires_approval(&self) -> bool {
        false
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}
