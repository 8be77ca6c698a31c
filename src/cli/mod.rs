//! CLI surface

pub mod run;

use clap::Parser;

/// Wink is a lightweight CLI coding agent that connects to local LLMs
/// (via Ollama) for rapid script generation and coding assistance.
///
/// It provides file operations, code search, command execution, and web
/// integration with a safe approval workflow.
#[derive(Parser, Debug)]
#[command(name = "wink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Natural language prompt (required unless --continue is specified)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// LLM model to use
    #[arg(short, long, env = "WINK_MODEL")]
    pub model: Option<String>,

    /// Continue previous session
    #[arg(long = "continue")]
    pub continue_session: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// LLM API timeout in seconds (5-300)
    #[arg(long, env = "WINK_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Ollama base URL
    #[arg(long = "ollama-url", env = "WINK_OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Output format (human or json)
    #[arg(long, value_parser = ["human", "json"])]
    pub format: Option<String>,
}
