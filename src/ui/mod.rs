//! Output formatting and channel discipline
//!
//! Model-produced text goes to stdout (pipeable); prompts, progress, and
//! diagnostics go to stderr. JSON mode wraps each emission as a typed record.

pub mod prompt;

use crate::config::OutputFormat;
use crate::tool::ToolResult;
use serde_json::json;

/// Formats user-facing emissions in human or JSON mode
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_message(&self, content: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({
                "type": "message",
                "content": content,
            }))
            .unwrap_or_default(),
            OutputFormat::Human => content.to_string(),
        }
    }

    pub fn format_tool_result(&self, result: &ToolResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let mut record = serde_json::to_value(result).unwrap_or_default();
                if let Some(obj) = record.as_object_mut() {
                    obj.insert("type".to_string(), json!("tool_result"));
                }
                serde_json::to_string_pretty(&record).unwrap_or_default()
            }
            OutputFormat::Human => {
                if result.success {
                    format!("✓ {}", result.output)
                } else {
                    format!("✗ Error: {}", result.error)
                }
            }
        }
    }

    pub fn format_auto_approval(&self, tool_name: &str, rule_description: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({
                "type": "auto_approval",
                "tool": tool_name,
                "rule": rule_description,
            }))
            .unwrap_or_default(),
            OutputFormat::Human => {
                format!("⚡ Auto-approved: {} (rule: {})", tool_name, rule_description)
            }
        }
    }

    pub fn format_session_info(&self, session_id: &str, message_count: usize) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({
                "type": "session_info",
                "session_id": session_id,
                "message_count": message_count,
            }))
            .unwrap_or_default(),
            OutputFormat::Human => {
                let short = &session_id[..session_id.len().min(8)];
                format!(
                    "Session: {} ({} messages)\nUse 'wink --continue' to resume this session.",
                    short, message_count
                )
            }
        }
    }
}

/// Model output, on stdout for piping
pub fn print_output(content: &str) {
    println!("{}", content);
}

/// Informational messages, on stderr
pub fn print_info(message: &str) {
    eprintln!("{}", message);
}

pub fn print_success(message: &str) {
    eprintln!("✓ {}", message);
}

pub fn print_warning(message: &str) {
    eprintln!("⚠ {}", message);
}
