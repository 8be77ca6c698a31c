//! Wires configuration, tools, and the agent together for one invocation.

use super::Cli;
use crate::agent::Agent;
use crate::approval::ApprovalEngine;
use crate::cancel::CancelToken;
use crate::config::rules::RuleStore;
use crate::config::{ConfigStore, OutputFormat};
use crate::provider::ollama::LlmClient;
use crate::session::SessionStore;
use crate::session::context::ContextManager;
use crate::tool::terminal::{CommandHistory, RunInTerminalTool, TerminalLastCommandTool};
use crate::tool::{ToolRegistry, dir, file, search, web};
use crate::ui::Formatter;
use crate::ui::prompt::StdinPrompt;
use anyhow::{Context, Result, bail};
use std::sync::Arc;

pub async fn execute(cli: Cli, cancel: CancelToken) -> Result<()> {
    let prompt = cli.prompt.as_deref().unwrap_or_default().trim().to_string();
    if prompt.is_empty() && !cli.continue_session {
        bail!("--prompt/-p is required unless --continue is specified");
    }

    let config_store = ConfigStore::open()?;
    let config = config_store.get().clone();

    // Precedence: explicit flag > environment (clap env fills the flag) >
    // persisted config > built-in default.
    let model = cli.model.unwrap_or_else(|| config.default_model.clone());
    let base_url = cli.ollama_url.unwrap_or_else(|| config.ollama_base_url.clone());
    let timeout_seconds = cli.timeout.unwrap_or(config.api_timeout_seconds);
    if !(5..=300).contains(&timeout_seconds) {
        bail!("timeout must be between 5 and 300 seconds, got {}", timeout_seconds);
    }

    let output_format = match cli.format.as_deref() {
        Some("json") => OutputFormat::Json,
        Some(_) => OutputFormat::Human,
        None => config.output_format,
    };

    let working_dir = std::env::current_dir().context("failed to get working directory")?;
    tracing::debug!(
        model = %model,
        timeout_seconds,
        ollama_url = %base_url,
        working_dir = %working_dir.display(),
        "configuration resolved"
    );

    let llm = Box::new(LlmClient::new(&base_url, &model, timeout_seconds));
    let tools = build_registry()?;
    let approval = ApprovalEngine::new(RuleStore::new(config_store), Box::new(StdinPrompt::new()));
    let sessions = SessionStore::open()?;
    let context = ContextManager::new(config.max_session_messages);
    let formatter = Formatter::new(output_format);

    let mut agent = Agent::new(llm, tools, approval, sessions, context, formatter, cancel);
    agent
        .run(&prompt, &working_dir, cli.continue_session)
        .await
        .context("agent execution failed")
}

/// Register the built-in tool set. The command history is shared between the
/// two terminal tools at registration time.
fn build_registry() -> Result<ToolRegistry> {
    let history = Arc::new(CommandHistory::new());

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(file::CreateFileTool::new()))?;
    registry.register(Arc::new(file::ReadFileTool::new()))?;
    registry.register(Arc::new(file::ReplaceStringInFileTool::new()))?;
    registry.register(Arc::new(dir::CreateDirectoryTool::new()))?;
    registry.register(Arc::new(dir::ListDirTool::new()))?;
    registry.register(Arc::new(search::FileSearchTool::new()))?;
    registry.register(Arc::new(search::GrepSearchTool::new()))?;
    registry.register(Arc::new(RunInTerminalTool::new(history.clone())))?;
    registry.register(Arc::new(TerminalLastCommandTool::new(history)))?;
    registry.register(Arc::new(web::FetchWebpageTool::new()))?;

    tracing::debug!(count = registry.list().len(), "registered tools");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_the_ten_builtin_tools() {
        let registry = build_registry().unwrap();
        let names = registry.list();
        assert_eq!(names.len(), 10);
        for expected in [
            "create_file",
            "read_file",
            "replace_string_in_file",
            "create_directory",
            "list_dir",
            "file_search",
            "grep_search",
            "run_in_terminal",
            "terminal_last_command",
            "fetch_webpage",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
    }
}
