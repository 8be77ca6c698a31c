//! Approval engine
//!
//! Gates every tool call that requires approval: persisted rules are
//! consulted first, then the interactive prompt. Answering "always"
//! synthesizes a rule that matches exactly the current parameter set.

use crate::config::rules::{RuleStore, canonical_params};
use crate::tool::{Tool, ToolParams};
use crate::ui::prompt::{ApprovalPrompt, ApprovalResponse};
use anyhow::{Context, Result};
use serde_json::Value;

/// Outcome of an approval check
#[derive(Debug, Clone, Default)]
pub struct ApprovalDecision {
    pub approved: bool,
    /// Whether a persisted rule made the decision (must be surfaced to the user)
    pub auto_approved: bool,
    pub rule_description: String,
}

impl ApprovalDecision {
    fn approved_manually() -> Self {
        Self {
            approved: true,
            ..Default::default()
        }
    }

    fn rejected() -> Self {
        Self::default()
    }
}

/// Checks tool calls against rules and the interactive prompt
pub struct ApprovalEngine {
    rules: RuleStore,
    prompt: Box<dyn ApprovalPrompt>,
}

impl ApprovalEngine {
    pub fn new(rules: RuleStore, prompt: Box<dyn ApprovalPrompt>) -> Self {
        Self { rules, prompt }
    }

    /// Decide whether a tool call may run.
    pub fn check(&mut self, tool: &dyn Tool, params: &ToolParams) -> Result<ApprovalDecision> {
        if !tool.requires_approval() {
            return Ok(ApprovalDecision::approved_manually());
        }

        let params_value = Value::Object(params.clone());

        match self.rules.match_rule(tool.name(), &params_value) {
            Ok(Some(rule)) => {
                tracing::debug!(
                    tool = tool.name(),
                    rule_id = %rule.id,
                    "tool call auto-approved"
                );
                return Ok(ApprovalDecision {
                    approved: true,
                    auto_approved: true,
                    rule_description: rule.description,
                });
            }
            Ok(None) => {}
            Err(e) => {
                // Fall through to the interactive prompt on rule errors.
                tracing::warn!(error = %e, "failed to check auto-approval rules");
            }
        }

        let response = self
            .prompt
            .ask(tool.name(), params, tool.risk_level())
            .context("failed to get approval")?;

        match response {
            ApprovalResponse::Yes => {
                tracing::debug!(tool = tool.name(), "tool call manually approved");
                Ok(ApprovalDecision::approved_manually())
            }
            ApprovalResponse::No => {
                tracing::debug!(tool = tool.name(), "tool call rejected");
                Ok(ApprovalDecision::rejected())
            }
            ApprovalResponse::Always => {
                if let Err(e) = self.create_rule(tool.name(), &params_value) {
                    // Still approve this one call even if rule creation failed.
                    tracing::warn!(error = %e, "failed to create auto-approval rule");
                }
                Ok(ApprovalDecision {
                    approved: true,
                    auto_approved: false,
                    rule_description: "newly created rule".to_string(),
                })
            }
        }
    }

    /// Synthesize a rule whose pattern is the regex-escaped canonical JSON of
    /// the current parameters: it matches this exact parameter set and
    /// nothing else. Widening a rule is a deliberate manual edit, never done
    /// here.
    fn create_rule(&mut self, tool_name: &str, params: &Value) -> Result<()> {
        let params_json = canonical_params(params)?;
        let pattern = format!("^{}$", regex::escape(&params_json));
        let description = format!(
            "Auto-approve {} with params: {}",
            tool_name,
            truncate(&params_json, 50)
        );

        let rule = self.rules.add(tool_name, &pattern, &description)?;
        tracing::info!(
            rule_id = %rule.id,
            tool = tool_name,
            description = %description,
            "auto-approval rule created"
        );
        crate::ui::print_success(&format!("Created auto-approval rule: {}", description));
        Ok(())
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }
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
