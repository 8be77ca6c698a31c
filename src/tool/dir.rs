//! Directory tools: create_directory, list_dir

use super::path::{resolve_path, sanitize_for_display};
use super::{RiskLevel, Tool, ToolParams, ToolResult, require_str};
use crate::cancel::CancelToken;
use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Instant;
use tokio::fs;

/// Listing cap; longer directories get an elided-tail note
const MAX_DIR_ENTRIES: usize = 1000;

/// Create a directory tree recursively
pub struct CreateDirectoryTool;

impl CreateDirectoryTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory structure recursively"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the directory to create"
                }
            },
            "required": ["path"]
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let path = require_str(params, "path")?;
        let resolved = resolve_path(working_dir, path)?;
        if resolved.is_file() {
            bail!("path '{}' exists as a file", path);
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

        // Idempotent: an existing directory is a success.
        fs::create_dir_all(&resolved).await?;

        tracing::info!(
            path = %sanitize_for_display(working_dir, &resolved),
            "directory created"
        );

        Ok(ToolResult::success(format!("Created directory: {}", path))
            .with_files(vec![path.to_string()])
            .with_metadata("path", json!(path))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::SafeWrite
    }
}

/// List the contents of a directory
pub struct ListDirTool;

impl ListDirTool {
    pub fn new() -> Self {
        Self
    }
}

fn requested_path(params: &ToolParams) -> String {
    match params.get("path").and_then(Value::as_str) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => ".".to_string(),
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to directory (default: current directory)",
                    "default": "."
                }
            }
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let path = requested_path(params);
        let resolved = resolve_path(working_dir, &path)?;
        let meta = match std::fs::metadata(&resolved) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("path '{}' not found", path)
            }
            Err(e) => bail!("cannot access path '{}': {}", path, e),
        };
        if !meta.is_dir() {
            bail!("path '{}' is not a directory", path);
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
        let path = requested_path(params);
        let resolved = resolve_path(working_dir, &path)?;

        let mut names = Vec::new();
        let mut file_count = 0usize;
        let mut dir_count = 0usize;
        let mut total_entries = 0usize;

        let mut entries = fs::read_dir(&resolved).await?;
        while let Some(entry) = entries.next_entry().await? {
            total_entries += 1;
            if names.len() >= MAX_DIR_ENTRIES {
                continue;
            }
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                // Stable "/" suffix regardless of platform so the model and
                // scripts see consistent listings.
                name.push('/');
                dir_count += 1;
            } else {
                file_count += 1;
            }
            names.push(name);
        }
        names.sort();

        let mut output = format!("Contents of {}:\n", path);
        for name in &names {
            output.push_str("  ");
            output.push_str(name);
            output.push('\n');
        }
        if total_entries > MAX_DIR_ENTRIES {
            output.push_str(&format!(
                "  ... ({} more entries not shown)\n",
                total_entries - MAX_DIR_ENTRIES
            ));
        }

        Ok(ToolResult::success(output)
            .with_metadata("total_entries", json!(total_entries))
            .with_metadata("files", json!(file_count))
            .with_metadata("directories", json!(dir_count))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(pairs: &[(&str, Value)]) -> ToolParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let dir = tempdir().unwrap();
        let tool = CreateDirectoryTool::new();
        let p = params(&[("path", json!("a/b/c"))]);

        for _ in 0..2 {
            tool.validate(&p, dir.path()).unwrap();
            let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
            assert!(result.success);
        }
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn create_directory_rejects_existing_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("taken"), "").unwrap();
        let tool = CreateDirectoryTool::new();
        let p = params(&[("path", json!("taken"))]);
        assert!(tool.validate(&p, dir.path()).is_err());
    }

    #[tokio::test]
    async fn list_dir_sorts_and_marks_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zdir")).unwrap();
        std::fs::write(dir.path().join("afile"), "").unwrap();
        let tool = ListDirTool::new();
        let p = ToolParams::new();
        tool.validate(&p, dir.path()).unwrap();
        let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
        assert!(result.success);
        let afile_pos = result.output.find("afile").unwrap();
        let zdir_pos = result.output.find("zdir/").unwrap();
        assert!(afile_pos < zdir_pos);
        assert_eq!(result.metadata["files"], json!(1));
        assert_eq!(result.metadata["directories"], json!(1));
    }

    #[tokio::test]
    async fn list_dir_rejects_file_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "").unwrap();
        let tool = ListDirTool::new();
        let p = params(&[("path", json!("f.txt"))]);
        assert!(tool.validate(&p, dir.path()).is_err());
    }
}
