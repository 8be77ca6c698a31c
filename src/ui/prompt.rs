//! Interactive approval prompt
//!
//! The question goes to stderr so stdout stays clean for model text; the
//! answer is one line from stdin. Anything unrecognized (including EOF on a
//! non-interactive stdin) counts as "no".

use crate::tool::{RiskLevel, ToolParams};
use anyhow::Result;
use serde_json::Value;
use std::io::{BufRead, Write};

/// The user's approval decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    /// Approve once
    Yes,
    /// Reject
    No,
    /// Approve and create an auto-approval rule
    Always,
}

/// Seam for asking the user; tests substitute a scripted implementation.
pub trait ApprovalPrompt: Send + Sync {
    fn ask(&self, tool_name: &str, params: &ToolParams, risk: RiskLevel) -> Result<ApprovalResponse>;
}

/// Prompt on stderr, read from stdin
pub struct StdinPrompt;

impl StdinPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalPrompt for StdinPrompt {
    fn ask(&self, tool_name: &str, params: &ToolParams, risk: RiskLevel) -> Result<ApprovalResponse> {
        let mut err = std::io::stderr().lock();

        writeln!(err, "\n┌─ Tool Approval Required ─────────────────")?;
        writeln!(err, "│ Tool: {}", tool_name)?;
        writeln!(err, "│ Risk Level: {}", risk)?;
        writeln!(err, "│ Parameters:")?;
        for (key, value) in params {
            writeln!(err, "│   {}: {}", key, format_param_value(value))?;
        }
        if let Some(path) = params.get("path").and_then(Value::as_str) {
            writeln!(err, "│ Files affected: {}", truncate(path, 60))?;
        }
        writeln!(err, "└──────────────────────────────────────────")?;
        writeln!(err, "\nApprove this operation?")?;
        writeln!(err, "  (y)es    - Approve once")?;
        writeln!(err, "  (n)o     - Reject")?;
        writeln!(err, "  (a)lways - Approve and auto-approve similar operations")?;
        write!(err, "\nYour choice: ")?;
        err.flush()?;

        let mut input = String::new();
        let read = std::io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            // Non-interactive stdin: never approve silently.
            writeln!(err, "No input available. Defaulting to 'no'.")?;
            return Ok(ApprovalResponse::No);
        }

        Ok(parse_response(&input, &mut err))
    }
}

fn parse_response(input: &str, err: &mut impl Write) -> ApprovalResponse {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => ApprovalResponse::Yes,
        "n" | "no" => ApprovalResponse::No,
        "a" | "always" => ApprovalResponse::Always,
        _ => {
            let _ = writeln!(err, "Invalid response. Defaulting to 'no'.");
            ApprovalResponse::No
        }
    }
}

fn format_param_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    truncate(&text, 100)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len.saturating_sub(3);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ApprovalResponse {
        let mut sink = Vec::new();
        parse_response(input, &mut sink)
    }

    #[test]
    fn maps_responses() {
        assert_eq!(parse("y\n"), ApprovalResponse::Yes);
        assert_eq!(parse("YES\n"), ApprovalResponse::Yes);
        assert_eq!(parse("n\n"), ApprovalResponse::No);
        assert_eq!(parse("no\n"), ApprovalResponse::No);
        assert_eq!(parse("a\n"), ApprovalResponse::Always);
        assert_eq!(parse("Always\n"), ApprovalResponse::Always);
    }

    #[test]
    fn unknown_input_defaults_to_no() {
        assert_eq!(parse("maybe\n"), ApprovalResponse::No);
        assert_eq!(parse("\n"), ApprovalResponse::No);
    }

    #[test]
    fn long_values_are_truncated() {
        let long = "x".repeat(500);
        let shown = format_param_value(&Value::String(long));
        assert!(shown.len() <= 100);
        assert!(shown.ends_with("..."));
    }
}
