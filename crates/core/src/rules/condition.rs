//! Condition-style rule matching (spec §4.L): iterate `{path, op, value}`
//! conditions, combine by `operator` (AND/OR).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionClause {
    pub path: String,
    pub op: ConditionOp,
    pub value: Value,
}

impl ConditionClause {
    pub fn matches(&self, root: &Value) -> bool {
        let Some(actual) = navigate(root, &self.path) else {
            return false;
        };

        match self.op {
            ConditionOp::Eq => actual == &self.value,
            ConditionOp::Ne => actual != &self.value,
            ConditionOp::Contains => match (actual, &self.value) {
                (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
                (Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
            ConditionOp::Regex => match (actual, &self.value) {
                (Value::String(a), Value::String(pattern)) => regex::Regex::new(pattern)
                    .map(|re| re.is_match(a))
                    .unwrap_or(false),
                _ => false,
            },
            ConditionOp::Gt | ConditionOp::Gte | ConditionOp::Lt | ConditionOp::Lte => {
                match (as_f64(actual), as_f64(&self.value)) {
                    (Some(a), Some(b)) => match self.op {
                        ConditionOp::Gt => a > b,
                        ConditionOp::Gte => a >= b,
                        ConditionOp::Lt => a < b,
                        ConditionOp::Lte => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn navigate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombineOp {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRule {
    pub conditions: Vec<ConditionClause>,
    pub operator: CombineOp,
}

impl ConditionRule {
    pub fn matches(&self, root: &Value) -> bool {
        match self.operator {
            CombineOp::And => self.conditions.iter().all(|c| c.matches(root)),
            CombineOp::Or => self.conditions.iter().any(|c| c.matches(root)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_coerces_strings() {
        let clause = ConditionClause {
            path: "bytes_out".to_string(),
            op: ConditionOp::Gt,
            value: serde_json::json!(1000),
        };
        let root = serde_json::json!({ "bytes_out": "5000" });
        assert!(clause.matches(&root));
    }

    #[test]
    fn regex_op_matches_string_pattern() {
        let clause = ConditionClause {
            path: "user_agent".to_string(),
            op: ConditionOp::Regex,
            value: serde_json::json!(r"^curl/\d+"),
        };
        let root = serde_json::json!({ "user_agent": "curl/7.81.0" });
        assert!(clause.matches(&root));
    }

    #[test]
    fn or_combine_matches_on_one_hit() {
        let rule = ConditionRule {
            conditions: vec![
                ConditionClause {
                    path: "action".to_string(),
                    op: ConditionOp::Eq,
                    value: serde_json::json!("delete"),
                },
                ConditionClause {
                    path: "action".to_string(),
                    op: ConditionOp::Eq,
                    value: serde_json::json!("drop"),
                },
            ],
            operator: CombineOp::Or,
        };
        let root = serde_json::json!({ "action": "drop" });
        assert!(rule.matches(&root));
    }
}
