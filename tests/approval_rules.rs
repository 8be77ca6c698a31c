//! Approval-rule store and engine exercised through the public API, with
//! rules persisting through the config document across reopen.

use anyhow::Result;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wink::approval::ApprovalEngine;
use wink::config::ConfigStore;
use wink::config::rules::{RuleStore, canonical_params};
use wink::tool::{RiskLevel, Tool, ToolParams, ToolResult};
use wink::ui::prompt::{ApprovalPrompt, ApprovalResponse};

fn rule_store(config_path: &Path) -> RuleStore {
    RuleStore::new(ConfigStore::open_at(config_path.to_path_buf()).unwrap())
}

fn exact_pattern(params: &Value) -> String {
    format!("^{}$", regex::escape(&canonical_params(params).unwrap()))
}

#[test]
fn rules_survive_reopen_with_usage_stats() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let params = json!({"path": "notes.txt"});

    {
        let mut rules = rule_store(&config_path);
        rules
            .add("read_file", &exact_pattern(&params), "Auto-approve read_file")
            .unwrap();
        assert!(rules.match_rule("read_file", &params).unwrap().is_some());
    }

    // A fresh process sees the rule and the bumped counter, and keeps
    // counting.
    let mut rules = rule_store(&config_path);
    assert_eq!(rules.rules().len(), 1);
    assert_eq!(rules.rules()[0].use_count, 1);

    let matched = rules.match_rule("read_file", &params).unwrap().unwrap();
    assert_eq!(matched.use_count, 2);
    assert!(matched.last_used_at.is_some());
}

#[test]
fn matching_is_scoped_to_tool_name_and_exact_params() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let mut rules = rule_store(&config_path);

    let params = json!({"command": "git status"});
    rules
        .add("run_in_terminal", &exact_pattern(&params), "git status only")
        .unwrap();

    // Same params, different tool: no match.
    assert!(rules.match_rule("read_file", &params).unwrap().is_none());
    // Same tool, different command: no match.
    assert!(
        rules
            .match_rule("run_in_terminal", &json!({"command": "git push"}))
            .unwrap()
            .is_none()
    );
    // Extra field defeats the exact pattern.
    assert!(
        rules
            .match_rule(
                "run_in_terminal",
                &json!({"command": "git status", "timeout_seconds": 5})
            )
            .unwrap()
            .is_none()
    );
}

#[test]
fn blanket_and_malformed_patterns_are_refused() {
    let dir = tempdir().unwrap();
    let mut rules = rule_store(&dir.path().join("config.json"));

    for pattern in ["", ".*", "^.*$", ".+", "^.+$"] {
        assert!(rules.add("read_file", pattern, "too broad").is_err(), "{:?}", pattern);
    }
    assert!(rules.add("read_file", "[unclosed", "broken").is_err());
    assert!(rules.rules().is_empty());
}

#[test]
fn removed_rules_stay_gone_after_reopen() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");

    let rule_id = {
        let mut rules = rule_store(&config_path);
        let keep = rules.add("list_dir", "docs", "kept").unwrap();
        let drop = rules.add("list_dir", "tmp", "dropped").unwrap();
        rules.remove(&drop.id).unwrap();
        keep.id
    };

    let rules = rule_store(&config_path);
    assert_eq!(rules.rules().len(), 1);
    assert_eq!(rules.rules()[0].id, rule_id);
}

struct RecordingPrompt {
    response: ApprovalResponse,
    asked: std::sync::Mutex<usize>,
}

impl ApprovalPrompt for RecordingPrompt {
    fn ask(&self, _tool: &str, _params: &ToolParams, _risk: RiskLevel) -> Result<ApprovalResponse> {
        *self.asked.lock().unwrap() += 1;
        Ok(self.response)
    }
}

struct ReadTool;

#[async_trait::async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "reads"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    fn validate(&self, _params: &ToolParams, _working_dir: &Path) -> Result<()> {
        Ok(())
    }
    async fn execute(
        &self,
        _ctx: &wink::cancel::CancelToken,
        _params: &ToolParams,
        _working_dir: &Path,
    ) -> Result<ToolResult> {
        Ok(ToolResult::success("contents"))
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
}

fn engine(config_path: PathBuf, response: ApprovalResponse) -> ApprovalEngine {
    let store = ConfigStore::open_at(config_path).unwrap();
    ApprovalEngine::new(
        RuleStore::new(store),
        Box::new(RecordingPrompt {
            response,
            asked: std::sync::Mutex::new(0),
        }),
    )
}

#[test]
fn always_then_auto_match_across_engine_instances() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let tool = ReadTool;
    let params: ToolParams = [("path".to_string(), json!("a.txt"))].into_iter().collect();

    // First engine: user answers "always", creating a persisted rule.
    let mut first = engine(config_path.clone(), ApprovalResponse::Always);
    let decision = first.check(&tool, &params).unwrap();
    assert!(decision.approved);
    assert!(!decision.auto_approved);
    assert_eq!(decision.rule_description, "newly created rule");

    // Second engine over the same config home: the rule matches before any
    // prompt, so the scripted "no" is never consulted.
    let mut second = engine(config_path, ApprovalResponse::No);
    let decision = second.check(&tool, &params).unwrap();
    assert!(decision.approved);
    assert!(decision.auto_approved);
    assert!(decision.rule_description.contains("read_file"));
}
