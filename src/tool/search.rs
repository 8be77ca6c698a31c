//! Search tools: file_search (glob) and grep_search (content)

use super::path::resolve_path;
use super::{RiskLevel, Tool, ToolParams, ToolResult, optional_int, require_str};
use crate::cancel::CancelToken;
use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

const MAX_SEARCH_RESULTS: usize = 1000;
const MAX_SEARCH_DEPTH: usize = 20;

/// Glob matching with `**` support, rewritten to an anchored regex:
/// `**/` matches any directory prefix, `**` any suffix, `*` within a single
/// path segment, `?` a single non-separator character.
pub fn match_glob(pattern: &str, path: &str) -> Result<bool> {
    let pattern = pattern.replace('\\', "/");
    let path = path.replace('\\', "/");

    let mut regex_pattern = String::from("^");
    regex_pattern.push_str(&regex::escape(&pattern));
    let regex_pattern = regex_pattern
        .replace(r"\*\*/", "(.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    let re = Regex::new(&format!("{}$", regex_pattern))?;
    Ok(re.is_match(&path))
}

/// Find files matching a glob pattern
pub struct FileSearchTool;

impl FileSearchTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Search for files matching a glob pattern (e.g., '**/*.py', 'src/**/*.go')"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g., '**/*.py', 'src/**/*.go')"
                },
                "base_path": {
                    "type": "string",
                    "description": "Base directory to search from (default: current directory)",
                    "default": "."
                }
            },
            "required": ["pattern"]
        })
    }

    fn validate(&self, params: &ToolParams, working_dir: &Path) -> Result<()> {
        let pattern = require_str(params, "pattern")?;
        if pattern.contains('[') && !pattern.contains(']') {
            bail!("invalid glob pattern '{}': unclosed bracket", pattern);
        }
        if let Some(base) = params.get("base_path").and_then(Value::as_str) {
            if !base.is_empty() {
                resolve_path(working_dir, base)
                    .map_err(|_| anyhow::anyhow!("base_path '{}' is outside working directory", base))?;
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let pattern = require_str(params, "pattern")?.to_string();
        let base = match params.get("base_path").and_then(Value::as_str) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => ".".to_string(),
        };
        let abs_base = resolve_path(working_dir, &base)?;
        let root = working_dir.canonicalize()?;

        let mut matches = Vec::new();
        for entry in WalkDir::new(&abs_base)
            .max_depth(MAX_SEARCH_DEPTH)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if ctx.is_cancelled() {
                return Ok(ToolResult::error("file search cancelled").timed(started));
            }
            if matches.len() >= MAX_SEARCH_RESULTS {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if match_glob(&pattern, &rel).unwrap_or(false) {
                matches.push(rel);
            }
        }

        let mut output = String::new();
        if matches.is_empty() {
            output.push_str(&format!("No files found matching pattern '{}'", pattern));
        } else {
            output.push_str(&format!(
                "Found {} file(s) matching '{}':\n",
                matches.len(),
                pattern
            ));
            for m in &matches {
                output.push_str(&format!("  {}\n", m));
            }
            if matches.len() >= MAX_SEARCH_RESULTS {
                output.push_str(&format!(
                    "\nWarning: Found {}+ matches, showing first {}",
                    MAX_SEARCH_RESULTS, MAX_SEARCH_RESULTS
                ));
            }
        }

        tracing::debug!(matches = matches.len(), pattern = %pattern, "file_search done");

        Ok(ToolResult::success(output)
            .with_metadata("matches", json!(matches.len()))
            .with_metadata("pattern", json!(pattern))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}

/// Search file contents for text or a regex pattern
pub struct GrepSearchTool;

impl GrepSearchTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search file contents for text or regex pattern"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text or regex pattern to search for"
                },
                "is_regex": {
                    "type": "boolean",
                    "description": "Whether pattern is regex (default: false)",
                    "default": false
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob pattern to limit files searched (default: all files)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 100)",
                    "default": 100
                }
            },
            "required": ["pattern"]
        })
    }

    fn validate(&self, params: &ToolParams, _working_dir: &Path) -> Result<()> {
        let pattern = require_str(params, "pattern")?;
        if params.get("is_regex").and_then(Value::as_bool).unwrap_or(false) {
            Regex::new(pattern).map_err(|e| anyhow::anyhow!("invalid regex pattern: {}", e))?;
        }
        optional_int(params, "max_results", 1, 1000)?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &CancelToken,
        params: &ToolParams,
        working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let pattern = require_str(params, "pattern")?.to_string();
        let is_regex = params.get("is_regex").and_then(Value::as_bool).unwrap_or(false);
        let file_pattern = params
            .get("file_pattern")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let max_results = optional_int(params, "max_results", 1, 1000)?.unwrap_or(100) as usize;

        let re = if is_regex {
            Some(Regex::new(&pattern)?)
        } else {
            None
        };

        let root = working_dir.canonicalize()?;
        let mut matches: Vec<(String, usize, String)> = Vec::new();
        let mut files_searched = 0usize;

        'walk: for entry in WalkDir::new(&root)
            .max_depth(MAX_SEARCH_DEPTH)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if ctx.is_cancelled() {
                return Ok(ToolResult::error("grep search cancelled").timed(started));
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if !file_pattern.is_empty() && !match_glob(&file_pattern, &rel).unwrap_or(false) {
                continue;
            }
            if is_binary_file(entry.path()) {
                continue;
            }
            files_searched += 1;

            let content = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for (idx, line) in content.lines().enumerate() {
                let hit = match &re {
                    Some(re) => re.is_match(line),
                    None => line.contains(&pattern),
                };
                if hit {
                    matches.push((rel.clone(), idx + 1, line.trim().to_string()));
                    if matches.len() >= max_results {
                        break 'walk;
                    }
                }
            }
        }

        let mut output = String::new();
        if matches.is_empty() {
            output.push_str(&format!("No matches found for '{}'", pattern));
        } else {
            output.push_str(&format!(
                "Found {} match(es) for '{}':\n",
                matches.len(),
                pattern
            ));
            for (file, line, text) in &matches {
                output.push_str(&format!("  {}:{}: {}\n", file, line, text));
            }
            if matches.len() >= max_results {
                output.push_str(&format!("\nWarning: Reached limit of {} results", max_results));
            }
        }

        tracing::debug!(
            total_matches = matches.len(),
            files_searched,
            "grep_search done"
        );

        Ok(ToolResult::success(output)
            .with_metadata("total_matches", json!(matches.len()))
            .with_metadata("files_searched", json!(files_searched))
            .with_metadata("pattern", json!(pattern))
            .timed(started))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}

/// Binary heuristic: a NUL byte anywhere in the first 512 bytes.
fn is_binary_file(path: &Path) -> bool {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut buf = [0u8; 512];
    let n = match file.read(&mut buf) {
        Ok(n) => n,
        Err(_) => return false,
    };
    buf[..n].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(pairs: &[(&str, Value)]) -> ToolParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn glob_recursive_any_depth() {
        assert!(match_glob("**/*.rs", "src/tool/mod.rs").unwrap());
        assert!(match_glob("**/*.rs", "main.rs").unwrap());
        assert!(!match_glob("**/*.rs", "src/tool/mod.go").unwrap());
    }

    #[test]
    fn glob_single_segment_star() {
        assert!(match_glob("*.rs", "main.rs").unwrap());
        assert!(!match_glob("*.rs", "src/main.rs").unwrap());
    }

    #[test]
    fn glob_prefixed_recursive() {
        assert!(match_glob("src/**/*.ts", "src/a/b/c.ts").unwrap());
        assert!(match_glob("src/**/*.ts", "src/c.ts").unwrap());
        assert!(!match_glob("src/**/*.ts", "lib/c.ts").unwrap());
    }

    #[test]
    fn glob_question_mark() {
        assert!(match_glob("file?.txt", "file1.txt").unwrap());
        assert!(!match_glob("file?.txt", "file10.txt").unwrap());
        assert!(!match_glob("file?.txt", "file/.txt").unwrap());
    }

    #[tokio::test]
    async fn file_search_finds_nested_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep")).unwrap();
        std::fs::write(dir.path().join("src/deep/x.py"), "pass").unwrap();
        std::fs::write(dir.path().join("top.py"), "pass").unwrap();
        std::fs::write(dir.path().join("other.txt"), "").unwrap();

        let tool = FileSearchTool::new();
        let p = params(&[("pattern", json!("**/*.py"))]);
        tool.validate(&p, dir.path()).unwrap();
        let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.metadata["matches"], json!(2));
        assert!(result.output.contains("src/deep/x.py"));
        assert!(result.output.contains("top.py"));
    }

    #[tokio::test]
    async fn file_search_rejects_base_path_outside_root() {
        let dir = tempdir().unwrap();
        let tool = FileSearchTool::new();
        let p = params(&[("pattern", json!("*.py")), ("base_path", json!(".."))]);
        assert!(tool.validate(&p, dir.path()).is_err());
    }

    #[tokio::test]
    async fn grep_finds_matches_with_line_numbers() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "first\nneedle here\nlast").unwrap();
        let tool = GrepSearchTool::new();
        let p = params(&[("pattern", json!("needle"))]);
        tool.validate(&p, dir.path()).unwrap();
        let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
        assert!(result.output.contains("a.txt:2: needle here"));
        assert_eq!(result.metadata["total_matches"], json!(1));
    }

    #[tokio::test]
    async fn grep_skips_binary_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), b"\x00needle").unwrap();
        std::fs::write(dir.path().join("txt.txt"), "needle").unwrap();
        let tool = GrepSearchTool::new();
        let p = params(&[("pattern", json!("needle"))]);
        let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
        assert_eq!(result.metadata["total_matches"], json!(1));
        assert_eq!(result.metadata["files_searched"], json!(1));
    }

    #[tokio::test]
    async fn grep_honors_max_results() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("many.txt"), "hit\n".repeat(20)).unwrap();
        let tool = GrepSearchTool::new();
        let p = params(&[("pattern", json!("hit")), ("max_results", json!(5))]);
        let result = tool.execute(&CancelToken::never(), &p, dir.path()).await.unwrap();
        assert_eq!(result.metadata["total_matches"], json!(5));
        assert!(result.output.contains("Reached limit of 5 results"));
    }

    #[test]
    fn grep_validates_regex() {
        let tool = GrepSearchTool::new();
        let p = params(&[("pattern", json!("[unclosed")), ("is_regex", json!(true))]);
        assert!(tool.validate(&p, Path::new(".")).is_err());
    }
}
