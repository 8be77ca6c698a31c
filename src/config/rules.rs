//! Auto-approval rule store
//!
//! Rules live inside the config document; this store wraps rule lookup and
//! bookkeeping over a [`ConfigStore`].

use super::{ApprovalRule, ConfigStore};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

/// Manages the auto-approval rule list
pub struct RuleStore {
    store: ConfigStore,
}

impl RuleStore {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn rules(&self) -> &[ApprovalRule] {
        &self.store.get().auto_approval_rules
    }

    /// Add a rule after validating the pattern. Blanket match-anything
    /// patterns are refused: a rule must constrain the parameters it
    /// approves.
    pub fn add(&mut self, tool_name: &str, param_pattern: &str, description: &str) -> Result<ApprovalRule> {
        Regex::new(param_pattern).context("invalid regex pattern")?;
        if is_blanket_pattern(param_pattern) {
            bail!(
                "refusing blanket approval pattern '{}': rules must match specific parameters",
                param_pattern
            );
        }

        let rule = ApprovalRule {
            id: Uuid::new_v4().to_string(),
            tool_name: tool_name.to_string(),
            param_pattern: param_pattern.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            use_count: 0,
        };

        self.store.get_mut().auto_approval_rules.push(rule.clone());
        self.store.save()?;
        Ok(rule)
    }

    /// First rule (insertion order) whose tool name matches exactly and whose
    /// pattern matches the canonical JSON of `params`. On a match the rule's
    /// usage stats are updated and persisted best-effort.
    pub fn match_rule(&mut self, tool_name: &str, params: &Value) -> Result<Option<ApprovalRule>> {
        let params_json = canonical_params(params)?;

        let rules = &mut self.store.get_mut().auto_approval_rules;
        let mut matched_index = None;
        for (i, rule) in rules.iter().enumerate() {
            if rule.tool_name != tool_name {
                continue;
            }
            let re = match Regex::new(&rule.param_pattern) {
                Ok(re) => re,
                Err(_) => continue,
            };
            if re.is_match(&params_json) {
                matched_index = Some(i);
                break;
            }
        }

        let Some(i) = matched_index else {
            return Ok(None);
        };

        let rule = &mut self.store.get_mut().auto_approval_rules[i];
        rule.use_count += 1;
        rule.last_used_at = Some(Utc::now());
        let matched = rule.clone();

        if let Err(e) = self.store.save() {
            tracing::warn!(error = %e, "failed to persist rule usage stats");
        }

        Ok(Some(matched))
    }

    pub fn remove(&mut self, rule_id: &str) -> Result<()> {
        let rules = &mut self.store.get_mut().auto_approval_rules;
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        if rules.len() == before {
            bail!("rule not found: {}", rule_id);
        }
        self.store.save()
    }
}

/// Canonical serialization used for rule matching: serde_json's object map
/// is key-sorted, so equal parameter sets always serialize identically.
pub fn canonical_params(params: &Value) -> Result<String> {
    serde_json::to_string(params).context("failed to serialize params")
}

fn is_blanket_pattern(pattern: &str) -> bool {
    matches!(
        pattern.trim(),
        "" | ".*" | "^.*$" | ".+" | "^.+$" | "(?s).*" | "(?s)^.*$" | ".*?" | "[\\s\\S]*"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> RuleStore {
        RuleStore::new(ConfigStore::open_at(dir.join("config.json")).unwrap())
    }

    #[test]
    fn add_and_match_exact_pattern() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());

        let params = json!({"path": "a.txt"});
        let pattern = regex::escape(&canonical_params(&params).unwrap());
        rules.add("read_file", &pattern, "Auto-approve read_file").unwrap();

        let matched = rules.match_rule("read_file", &params).unwrap();
        assert!(matched.is_some());
        assert_eq!(matched.unwrap().use_count, 1);

        // Same params again bumps the counter.
        let matched = rules.match_rule("read_file", &params).unwrap().unwrap();
        assert_eq!(matched.use_count, 2);
    }

    #[test]
    fn tool_name_must_match_exactly() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        let params = json!({"path": "a.txt"});
        let pattern = regex::escape(&canonical_params(&params).unwrap());
        rules.add("read_file", &pattern, "desc").unwrap();

        assert!(rules.match_rule("create_file", &params).unwrap().is_none());
    }

    #[test]
    fn extra_field_defeats_exact_match() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        let params = json!({"path": "a.txt"});
        let pattern = format!("^{}$", regex::escape(&canonical_params(&params).unwrap()));
        rules.add("read_file", &pattern, "desc").unwrap();

        let with_extra = json!({"path": "a.txt", "start_line": 1});
        assert!(rules.match_rule("read_file", &with_extra).unwrap().is_none());
    }

    #[test]
    fn blanket_patterns_are_refused() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        for pattern in [".*", "^.*$", ".+", ""] {
            assert!(rules.add("read_file", pattern, "too broad").is_err());
        }
    }

    #[test]
    fn invalid_regex_is_refused() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        assert!(rules.add("read_file", "[unclosed", "bad").is_err());
    }

    #[test]
    fn first_matching_rule_wins() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        let params = json!({"command": "git status"});
        let json_str = canonical_params(&params).unwrap();
        rules.add("run_in_terminal", &regex::escape(&json_str), "first").unwrap();
        rules.add("run_in_terminal", "git", "second").unwrap();

        let matched = rules.match_rule("run_in_terminal", &params).unwrap().unwrap();
        assert_eq!(matched.description, "first");
    }

    #[test]
    fn remove_deletes_rule() {
        let dir = tempdir().unwrap();
        let mut rules = store_in(dir.path());
        let rule = rules.add("list_dir", "path", "desc").unwrap();
        rules.remove(&rule.id).unwrap();
        assert!(rules.rules().is_empty());
        assert!(rules.remove(&rule.id).is_err());
    }

    #[test]
    fn canonical_params_sorts_keys() {
        // serde_json's default map keeps keys sorted, so insertion order
        // does not affect the canonical form.
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(canonical_params(&a).unwrap(), canonical_params(&b).unwrap());
    }

    #[test]
    fn rules_persist_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut rules = store_in(dir.path());
            rules.add("list_dir", "docs", "persisted").unwrap();
        }
        let rules = store_in(dir.path());
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].description, "persisted");
    }
}
