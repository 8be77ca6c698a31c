//! File tools: create_file, read_file, replace_string_in_file

use super::path::{resolve_path, sanitize_for_display};
use super::{RiskLevel, Tool, ToolParams, ToolResult, require_str};
use crate::cancel::CancelToken;
use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use similar::{ChangeTag, TextDiff};
use std::path::Path;
use std::time::Instant;
use tokio::fs;

/// Largest file content accepted or returned whole (10 MiB)
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Create a new file with given content
pub struct CreateFileTool;

impl CreateFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file with specified content. The file must not already exist."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file to create"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let path = require_str(params, "path")?;
        let content = match params.get("content").and_then(Value::as_str) {
            Some(c) => c,
            None => bail!("content parameter is required and must be a string"),
        };

        if content.len() > MAX_FILE_SIZE {
            bail!(
                "content size ({} bytes) exceeds maximum allowed size ({} bytes)",
                content.len(),
                MAX_FILE_SIZE
            );
        }

        let resolved = resolve_path(working_dir, path)?;
        if resolved.exists() {
            bail!("file '{}' already exists. Use replace_string_in_file to modify", path);
        }

        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let path = require_str(params, "path")?;
        let content = params.get("content").and_then(Value::as_str).unwrap_or_default();

        let resolved = resolve_path(working_dir, path)?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&resolved, content).await?;

        let size = fs::metadata(&resolved).await.map(|m| m.len()).unwrap_or(0);
        tracing::info!(
            path = %sanitize_for_display(working_dir, &resolved),
            size_bytes = size,
            "file created"
        );

        Ok(ToolResult::success(format!("Created file: {} ({} bytes)", path, size))
            .with_files(vec![path.to_string()])
            .with_metadata("size_bytes", json!(size))
            .with_metadata("path", json!(path))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::SafeWrite
    }
}

/// Read file contents, optionally a 1-indexed inclusive line range
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file, optionally specifying a line range"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file to read"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Starting line number (1-indexed, optional)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Ending line number (1-indexed, inclusive, optional)"
                }
            },
            "required": ["path"]
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let path = require_str(params, "path")?;
        let resolved = resolve_path(working_dir, path)?;

        let meta = match std::fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("file '{}' not found", path)
            }
            Err(e) => bail!("cannot access file '{}': {}", path, e),
        };
        if meta.is_dir() {
            bail!("path '{}' is a directory, not a file", path);
        }

        let start = params.get("start_line").and_then(Value::as_i64);
        let end = params.get("end_line").and_then(Value::as_i64);
        if let Some(s) = start {
            if s < 1 {
                bail!("start_line must be positive, got {}", s);
            }
            if let Some(e) = end {
                if e < s {
                    bail!("end_line ({}) must be >= start_line ({})", e, s);
                }
            }
        }

        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let path = require_str(params, "path")?;
        let resolved = resolve_path(working_dir, path)?;

        let mut bytes = fs::read(&resolved).await?;
        let file_size = bytes.len();
        let truncated = file_size > MAX_FILE_SIZE;
        if truncated {
            tracing::warn!(
                path = %path,
                size_bytes = file_size,
                limit_bytes = MAX_FILE_SIZE,
                "file exceeds size limit, truncating"
            );
            bytes.truncate(MAX_FILE_SIZE);
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        let lines: Vec<&str> = content.split('\n').collect();
        let total_lines = lines.len();

        let start_line = params.get("start_line").and_then(Value::as_i64);
        let (output, lines_returned, header) = match start_line {
            Some(s) => {
                let start = (s as usize).saturating_sub(1);
                if start >= total_lines {
                    return Ok(ToolResult::error(format!(
                        "line range invalid - file has {} lines, requested start line {}",
                        total_lines, s
                    ))
                    .timed(started));
                }
                let end = params
                    .get("end_line")
                    .and_then(Value::as_i64)
                    .map(|e| (e as usize).min(total_lines))
                    .unwrap_or(total_lines);
                let selected = lines[start..end].join("\n");
                let returned = end - start;
                // The reported upper bound is capped at the real file length,
                // not the caller's (possibly beyond-EOF) end_line.
                let header = format!("Contents of {} (lines {}-{}):", path, s, s as usize + returned - 1);
                (selected, returned, header)
            }
            None => (content, total_lines, format!("Contents of {}:", path)),
        };

        let mut result = ToolResult::success(format!("{}\n{}", header, output))
            .with_metadata("total_lines", json!(total_lines))
            .with_metadata("lines_returned", json!(lines_returned))
            .with_metadata("file_size_bytes", json!(file_size));
        if truncated {
            result = result.with_metadata("truncated", json!(true));
        }
        Ok(result.timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}

/// Replace the first occurrence of a string in a file
pub struct ReplaceStringInFileTool;

impl ReplaceStringInFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReplaceStringInFileTool {
    fn name(&self) -> &str {
        "replace_string_in_file"
    }

    fn description(&self) -> &str {
        "Replace a specific string in a file with new content. Only replaces the first occurrence."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file to modify"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "String to replace with"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let path = require_str(params, "path")?;
        require_str(params, "old_string")?;
        if params.get("new_string").and_then(Value::as_str).is_none() {
            bail!("new_string parameter is required and must be a string");
        }

        let resolved = resolve_path(working_dir, path)?;
        let meta = match std::fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("file '{}' not found", path)
            }
            Err(e) => bail!("cannot access file '{}': {}", path, e),
        };
        if meta.is_dir() {
            bail!("path '{}' is a directory, not a file", path);
        }
        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let path = require_str(params, "path")?;
        let old_string = require_str(params, "old_string")?;
        let new_string = params.get("new_string").and_then(Value::as_str).unwrap_or_default();

        let resolved = resolve_path(working_dir, path)?;
        let content = fs::read_to_string(&resolved).await?;

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Ok(ToolResult::error(format!(
                "string '{}' not found in file",
                old_string
            ))
            .timed(started));
        }

        // First occurrence only: the model must supply enough surrounding
        // context to anchor the edit.
        let new_content = content.replacen(old_string, new_string, 1);
        fs::write(&resolved, &new_content).await?;

        let changed_line = content
            .split('\n')
            .position(|line| line.contains(old_string))
            .map(|i| i + 1)
            .unwrap_or(byte_offset_line(&content, old_string));

        tracing::info!(
            path = %sanitize_for_display(working_dir, &resolved),
            occurrences_found = occurrences,
            line_changed = changed_line,
            "string replaced in file"
        );

        let mut output = if occurrences > 1 {
            format!(
                "Replaced 1 occurrence in {} (found {} total occurrences, replaced only the first at line {})",
                path, occurrences, changed_line
            )
        } else {
            format!("Replaced 1 occurrence in {}", path)
        };
        output.push_str("\n\n");
        output.push_str(&diff_snippet(&content, &new_content));

        Ok(ToolResult::success(output)
            .with_files(vec![path.to_string()])
            .with_metadata("occurrences_found", json!(occurrences))
            .with_metadata("occurrences_replaced", json!(1))
            .with_metadata("lines_changed", json!([changed_line]))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Dangerous
    }
}

// Fallback for anchors spanning multiple lines: line of the match's first byte.
fn byte_offset_line(content: &str, needle: &str) -> usize {
    match content.find(needle) {
        Some(offset) => content[..offset].matches('\n').count() + 1,
        None => 0,
    }
}

fn diff_snippet(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => {
                out.push('-');
                out.push_str(change.value());
            }
            ChangeTag::Insert => {
                out.push('+');
                out.push_str(change.value());
            }
            ChangeTag::Equal => {}
        }
    }
    out
}
