//! Configuration system
//!
//! A single JSON document at `~/.wink/config.json` holds user preferences
//! and the auto-approval rule list. Saves go through a temp file plus an
//! atomic rename so a crash never leaves a torn document.

pub mod rules;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".wink";
const CONFIG_FILE: &str = "config.json";
pub const CONFIG_VERSION: &str = "1.0";

/// Output format for user-facing emissions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Human,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Human
    }
}

/// A persisted auto-approval rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: String,
    pub tool_name: String,
    /// Regex over the canonical JSON serialization of parameters
    pub param_pattern: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u64,
}

/// User configuration and preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub config_version: String,
    pub default_model: String,
    pub ollama_base_url: String,
    pub api_timeout_seconds: u64,
    pub max_session_messages: usize,
    #[serde(default)]
    pub auto_approval_rules: Vec<ApprovalRule>,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION.to_string(),
            default_model: "qwen3:8b".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            api_timeout_seconds: 30,
            max_session_messages: 100,
            auto_approval_rules: Vec::new(),
            output_format: OutputFormat::Human,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.default_model.is_empty() {
            bail!("default_model cannot be empty");
        }
        if self.ollama_base_url.is_empty() {
            bail!("ollama_base_url cannot be empty");
        }
        reqwest::Url::parse(&self.ollama_base_url)
            .with_context(|| format!("ollama_base_url '{}' is not a valid URL", self.ollama_base_url))?;
        if !(5..=300).contains(&self.api_timeout_seconds) {
            bail!("api_timeout_seconds must be between 5 and 300");
        }
        if !(10..=1000).contains(&self.max_session_messages) {
            bail!("max_session_messages must be between 10 and 1000");
        }
        for rule in &self.auto_approval_rules {
            Regex::new(&rule.param_pattern).with_context(|| {
                format!("approval rule '{}' has an invalid pattern", rule.id)
            })?;
        }
        Ok(())
    }
}

/// Handles loading and saving the config document
pub struct ConfigStore {
    config: Config,
    config_path: PathBuf,
}

impl ConfigStore {
    /// Open the store at the default location, creating the config directory
    /// and a default document on first use.
    pub fn open() -> Result<Self> {
        let home = BaseDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .context("failed to determine home directory")?;
        Self::open_at(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Open the store at an explicit path (tests point this at a temp dir).
    pub fn open_at(config_path: PathBuf) -> Result<Self> {
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory '{}'", dir.display()))?;
        }

        let mut store = Self {
            config: Config::default(),
            config_path,
        };
        store.load()?;
        Ok(store)
    }

    pub fn load(&mut self) -> Result<()> {
        if !self.config_path.exists() {
            self.config = Config::default();
            return self.save();
        }

        let data = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("failed to read config file '{}'", self.config_path.display()))?;
        self.config = serde_json::from_str(&data).context("failed to parse config file")?;
        self.config.validate().context("invalid config")?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.config).context("failed to marshal config")?;
        write_atomic(&self.config_path, data.as_bytes())
    }

    pub fn get(&self) -> &Config {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn update(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Write a file via a sibling temp file and rename, so readers never observe
/// a partial document.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)
        .with_context(|| format!("failed to write '{}'", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace '{}'", path.display()))?;
    Ok(())
}
