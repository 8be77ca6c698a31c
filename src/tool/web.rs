//! Web tool: fetch_webpage with a minimal robots.txt gate

use super::{RiskLevel, Tool, ToolParams, ToolResult, optional_int, require_str};
use crate::cancel::CancelToken;
use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Instant;
use tokio::time::Duration;

/// Response body cap (1 MiB)
const MAX_CONTENT_SIZE: usize = 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: i64 = 10;
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(3);
const USER_AGENT: &str = "wink-cli/1.0 (AI coding assistant)";

/// Fetch content from an http(s) URL
pub struct FetchWebpageTool {
    client: reqwest::Client,
}

impl FetchWebpageTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Best-effort robots.txt consult: default-allow on any failure.
    /// The probe uses its own short deadline, independent of the caller's
    /// timeout, matching the original behavior.
    async fn robots_allows(&self, url: &reqwest::Url) -> bool {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let response = match self
            .client
            .get(robots_url)
            .timeout(ROBOTS_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(_) => return true,
        };
        if response.status() != reqwest::StatusCode::OK {
            return true;
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => return true,
        };
        // Robots files are small; cap just in case.
        let body = if body.len() > 100 * 1024 {
            body[..100 * 1024].to_string()
        } else {
            body
        };

        robots_path_allowed(&body, url.path())
    }
}

/// Minimal robots.txt interpretation: only User-agent and Disallow lines,
/// applied to groups matching `*` or our own agent name.
fn robots_path_allowed(robots: &str, path: &str) -> bool {
    let mut group_applies = false;
    for raw in robots.lines() {
        let line = raw.trim();
        let lower = line.to_ascii_lowercase();
        if let Some(agent) = lower.strip_prefix("user-agent:") {
            let agent = agent.trim();
            group_applies = agent == "*" || agent.contains("wink");
            continue;
        }
        if group_applies {
            if let Some(disallow) = lower.strip_prefix("disallow:") {
                let prefix = line[line.len() - disallow.len()..].trim();
                if prefix == "/" {
                    return false;
                }
                if !prefix.is_empty() && path.starts_with(prefix) {
                    return false;
                }
            }
        }
    }
    true
}

impl Default for FetchWebpageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchWebpageTool {
    fn name(&self) -> &str {
        "fetch_webpage"
    }

    fn description(&self) -> &str {
        "Fetch content from a web page (must be http or https)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch (must be http or https)"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Request timeout in seconds (default: 10)",
                    "default": 10
                }
            },
            "required": ["url"]
        })
    }

    fn validate(&self, params: &ToolParams, _working_dir: &Path) -> Result<()> {
        let url_str = require_str(params, "url")?;
        let url = reqwest::Url::parse(url_str.trim())
            .map_err(|e| anyhow::anyhow!("invalid URL format: {}", e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("URL must use http or https scheme, got: {}", url.scheme());
        }
        if url.host_str().unwrap_or("").is_empty() {
            bail!("URL must have a valid host");
        }
        optional_int(params, "timeout_seconds", 1, 60)?;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &CancelToken,
        params: &ToolParams,
        _working_dir: &Path,
    ) -> Result<ToolResult> {
        let started = Instant::now();
        let url_str = require_str(params, "url")?.trim().to_string();
        let timeout_secs =
            optional_int(params, "timeout_seconds", 1, 60)?.unwrap_or(DEFAULT_TIMEOUT_SECS) as u64;

        let url = reqwest::Url::parse(&url_str)?;

        if !self.robots_allows(&url).await {
            tracing::warn!(url = %url_str, "robots.txt disallows access");
            return Ok(ToolResult {
                tool_call_id: String::new(),
                success: false,
                output: format!("Access to {} is disallowed by robots.txt", url_str),
                error: "robots.txt disallows access".to_string(),
                execution_time_ms: 0,
                files_affected: Vec::new(),
                metadata: Default::default(),
            }
            .timed(started));
        }

        // Cancellation drops the request future mid-flight, aborting the
        // transfer; only the robots probe above runs outside the race.
        tokio::select! {
            result = self.fetch_page(url, &url_str, timeout_secs, started) => result,
            _ = ctx.cancelled() => Ok(ToolResult::error("Request cancelled")
                .with_metadata("url", json!(url_str))
                .timed(started)),
        }
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Dangerous
    }
}

impl FetchWebpageTool {
    async fn fetch_page(
        &self,
        url: reqwest::Url,
        url_str: &str,
        timeout_secs: u64,
        started: Instant,
    ) -> Result<ToolResult> {
        let response = match self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(ToolResult::error(format!(
                    "Request timed out after {} seconds",
                    timeout_secs
                ))
                .timed(started));
            }
            Err(e) => {
                return Ok(ToolResult::error(format!("Failed to fetch: {}", e)).timed(started));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(format!("HTTP error: {}", status))
                .with_metadata("status_code", json!(status.as_u16()))
                .with_metadata("url", json!(url_str))
                .timed(started));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        // Stream up to the cap plus one sentinel byte so truncation is
        // detectable without buffering unbounded bodies.
        let mut body: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut stream = response;
        loop {
            match stream.chunk().await {
                Ok(Some(chunk)) => {
                    let room = MAX_CONTENT_SIZE + 1 - body.len();
                    if chunk.len() >= room {
                        body.extend_from_slice(&chunk[..room]);
                    } else {
                        body.extend_from_slice(&chunk);
                    }
                    if body.len() > MAX_CONTENT_SIZE {
                        truncated = true;
                        body.truncate(MAX_CONTENT_SIZE);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return Ok(
                        ToolResult::error(format!("Failed to read response: {}", e)).timed(started)
                    );
                }
            }
        }

        let content = String::from_utf8_lossy(&body);
        let mut text = format!("Fetched content from {}\n", url_str);
        text.push_str(&format!("Status: {}\n", status));
        text.push_str(&format!("Content-Type: {}\n", content_type));
        text.push_str(&format!("Size: {:.2} KB\n", body.len() as f64 / 1024.0));
        if truncated {
            text.push_str("Content truncated to 1MB limit\n");
        }
        text.push_str("\nContent:\n");
        text.push_str(&content);

        tracing::debug!(status = status.as_u16(), size = body.len(), "fetch_webpage done");

        Ok(ToolResult::success(text)
            .with_metadata("url", json!(url_str))
            .with_metadata("status_code", json!(status.as_u16()))
            .with_metadata("content_length", json!(body.len()))
            .with_metadata("content_type", json!(content_type))
            .with_metadata("truncated", json!(truncated))
            .timed(started))
    }
}
