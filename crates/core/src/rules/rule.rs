//! A loaded detection rule: id/title/severity/tags plus a selection-style
//! or condition-style detection body (spec §3 Rule, §4.L).

use super::condition::ConditionRule;
use super::ir::Node;
use crate::types::Severity;
use serde_json::Value;

/// The two rule shapes `spec.md` §3/§4.L recognizes.
#[derive(Debug, Clone)]
pub enum Detection {
    Selection(Node),
    Condition(ConditionRule),
}

impl Detection {
    /// Evaluates this rule's detection body against an event, returning
    /// whether it matched and which selection names contributed (empty for
    /// condition-style rules, which have no named sub-clauses to report).
    pub fn evaluate(&self, event: &Value) -> (bool, Vec<String>) {
        match self {
            Detection::Selection(node) => {
                let result = node.evaluate(event);
                (result.matched, result.matched_selections)
            }
            Detection::Condition(rule) => (rule.matches(event), Vec::new()),
        }
    }
}

/// A loaded detection rule (spec §3 Rule).
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub detection: Detection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ir::{Clause, Matcher, Selection};

    #[test]
    fn selection_rule_reports_matched_selection_names() {
        let rule = Rule {
            id: "rule-1".to_string(),
            title: "failed login".to_string(),
            severity: Severity::High,
            tags: vec!["auth".to_string()],
            detection: Detection::Selection(Node::Leaf(Selection {
                name: "sel".to_string(),
                clauses: vec![Clause {
                    path: "status".to_string(),
                    matcher: Matcher::Equal("failure".to_string()),
                }],
            })),
        };
        let event = serde_json::json!({ "status": "failure" });
        let (matched, selections) = rule.detection.evaluate(&event);
        assert!(matched);
        assert_eq!(selections, vec!["sel".to_string()]);
    }

    #[test]
    fn condition_rule_matches_with_no_named_selections() {
        let rule = Rule {
            id: "rule-2".to_string(),
            title: "large transfer".to_string(),
            severity: Severity::Medium,
            tags: vec![],
            detection: Detection::Condition(ConditionRule {
                conditions: vec![super::super::condition::ConditionClause {
                    path: "bytes_out".to_string(),
                    op: super::super::condition::ConditionOp::Gt,
                    value: serde_json::json!(1000),
                }],
                operator: super::super::condition::CombineOp::And,
            }),
        };
        let event = serde_json::json!({ "bytes_out": 2000 });
        let (matched, selections) = rule.detection.evaluate(&event);
        assert!(matched);
        assert!(selections.is_empty());
    }
}
