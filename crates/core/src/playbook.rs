//! Playbook declaration types (spec §3 Playbook, §4.N). Triggers and action
//! conditions reuse the condition-style `{field, op, value}` grammar of
//! `rules::condition`.

use crate::rules::condition::ConditionClause;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Kinds of playbook action the engine dispatches to a registered handler
/// (spec §4.N). Kept as a closed tag set, not reflection-based, per §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    CaseManagement,
    Analyzer,
    Automation,
    Custom,
}

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub name: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub conditions: Vec<ConditionClause>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl PlaybookAction {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<ConditionClause>,
    pub actions: Vec<PlaybookAction>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Playbook {
    /// A playbook's triggers are evaluated against an Alert's attribute
    /// tree; any single matching trigger is enough (spec §4.N step 1 reads
    /// the prototype's loader, which treats the trigger list as OR-combined
    /// conditions — distinct `ConditionRule`-style AND/OR groups are not
    /// part of the trigger grammar, only of individual action conditions).
    pub fn matches(&self, alert: &serde_json::Value) -> bool {
        self.enabled && self.triggers.iter().any(|t| t.matches(alert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::condition::ConditionOp;

    #[test]
    fn disabled_playbook_never_matches() {
        let playbook = Playbook {
            id: "pb-1".to_string(),
            name: "test".to_string(),
            triggers: vec![ConditionClause {
                path: "severity".to_string(),
                op: ConditionOp::Eq,
                value: serde_json::json!("high"),
            }],
            actions: vec![],
            enabled: false,
        };
        let alert = serde_json::json!({ "severity": "high" });
        assert!(!playbook.matches(&alert));
    }

    #[test]
    fn any_trigger_match_is_sufficient() {
        let playbook = Playbook {
            id: "pb-2".to_string(),
            name: "test".to_string(),
            triggers: vec![
                ConditionClause {
                    path: "severity".to_string(),
                    op: ConditionOp::Eq,
                    value: serde_json::json!("critical"),
                },
                ConditionClause {
                    path: "severity".to_string(),
                    op: ConditionOp::Eq,
                    value: serde_json::json!("high"),
                },
            ],
            actions: vec![],
            enabled: true,
        };
        let alert = serde_json::json!({ "severity": "high" });
        assert!(playbook.matches(&alert));
    }

    #[test]
    fn action_timeout_defaults_to_300_seconds() {
        let json = serde_json::json!({
            "type": "case-management",
            "name": "open case",
        });
        let action: PlaybookAction = serde_json::from_value(json).unwrap();
        assert_eq!(action.timeout_seconds, 300);
    }
}
