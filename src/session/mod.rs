//! Session management
//!
//! A session is the durable record of one conversation: messages, tool
//! results, and the working-directory jail they ran against. One JSON file
//! per session under `~/.wink/sessions/`, rewritten atomically after every
//! orchestrator iteration.

pub mod context;

use crate::config::write_atomic;
use crate::tool::{ToolParams, ToolResult};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SESSIONS_DIR: &str = ".wink/sessions";

/// State of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Currently running
    Active,
    /// Interrupted, can be continued
    Paused,
    /// Finished successfully
    Completed,
    /// Ended with an error
    Errored,
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A tool call proposed by the model, with parsed parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub parameters: ToolParams,
}

/// A single message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    pub fn tool(content: impl Into<String>, tool_call_id: &str) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.metadata
            .insert("tool_call_id".to_string(), Value::String(tool_call_id.to_string()));
        msg
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            metadata: Map::new(),
        }
    }
}

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub working_dir: PathBuf,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub tool_results: Vec<ToolResult>,
    pub status: SessionStatus,
}

/// Handles session persistence
pub struct SessionStore {
    sessions_path: PathBuf,
}

impl SessionStore {
    /// Open the store at the default location under the home directory.
    pub fn open() -> Result<Self> {
        let home = BaseDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .context("failed to determine home directory")?;
        Self::open_at(home.join(SESSIONS_DIR))
    }

    /// Open the store at an explicit directory (tests point this at a temp dir).
    pub fn open_at(sessions_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&sessions_path).with_context(|| {
            format!("failed to create sessions directory '{}'", sessions_path.display())
        })?;
        Ok(Self { sessions_path })
    }

    /// Mint a new active session rooted at `working_dir` and persist it
    /// immediately.
    pub fn create(&self, working_dir: &Path, model: &str) -> Result<Session> {
        if !working_dir.is_absolute() {
            bail!("working directory must be absolute");
        }
        if !working_dir.is_dir() {
            bail!("working directory '{}' does not exist", working_dir.display());
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            working_dir: working_dir.to_path_buf(),
            model: model.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            tool_results: Vec::new(),
            status: SessionStatus::Active,
        };
        self.save_snapshot(&session)?;
        Ok(session)
    }

    /// Persist, stamping `updated_at`.
    pub fn save(&self, session: &mut Session) -> Result<()> {
        session.updated_at = Utc::now();
        self.save_snapshot(session)
    }

    fn save_snapshot(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string_pretty(session).context("failed to marshal session")?;
        write_atomic(&self.session_path(&session.id), data.as_bytes())
    }

    pub fn load(&self, session_id: &str) -> Result<Session> {
        let path = self.session_path(session_id);
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read session file '{}'", path.display()))?;
        serde_json::from_str(&data).context("failed to parse session file")
    }

    /// The session file with the greatest modification time. Mtime rather
    /// than a timestamp inside the file: it survives clock skew and reflects
    /// the most recent interaction.
    pub fn latest(&self) -> Result<Session> {
        let mut newest: Option<(std::time::SystemTime, String)> = None;

        for entry in std::fs::read_dir(&self.sessions_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified());
            let Ok(modified) = modified else { continue };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, stem.to_string()));
            }
        }

        match newest {
            Some((_, id)) => self.load(&id),
            None => bail!("no sessions found"),
        }
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.sessions_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }

    pub fn delete(&self, session_id: &str) -> Result<()> {
        std::fs::remove_file(self.session_path(session_id))
            .with_context(|| format!("failed to delete session '{}'", session_id))
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_path.join(format!("{}.json", session_id))
    }
}
