//! Loads sigma-style YAML rule definitions from `RULES_DIR/{sigma,custom}`
//! into the typed `Rule`/`Detection` IR once at startup (spec §9 design
//! note: "parse declarative rules once at load... do not re-parse per
//! event").

use siem_core::rules::ir::{Clause, Matcher, Node, Selection};
use siem_core::{CombineOp, ConditionClause, ConditionOp, ConditionRule, Detection, Error, ErrorCode, Result, Rule, Severity};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(serde::Deserialize)]
struct RawRule {
    id: String,
    title: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    tags: Vec<String>,
    detection: serde_json::Value,
}

/// Loads every `*.yml`/`*.yaml` file under `sigma/` and `custom/` beneath
/// `rules_dir` into a `Rule`, sorted by id (spec §4.L determinism contract
/// begins at load time so the engine never needs to re-sort per event).
pub fn load_rules(rules_dir: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for subdir in ["sigma", "custom"] {
        let dir = Path::new(rules_dir).join(subdir);
        if !dir.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&dir)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?
        {
            let entry = entry.map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            rules.push(load_rule_file(&path)?);
        }
    }
    rules.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(rules)
}

fn load_rule_file(path: &Path) -> Result<Rule> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
    parse_rule(&contents)
}

pub fn parse_rule(yaml: &str) -> Result<Rule> {
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?;
    let json_value = serde_json::to_value(&yaml_value).map_err(Error::from)?;
    let raw: RawRule = serde_json::from_value(json_value).map_err(Error::from)?;

    let detection_obj = raw
        .detection
        .as_object()
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "detection must be a mapping"))?;

    let detection = if detection_obj.contains_key("conditions") {
        parse_condition_detection(detection_obj)?
    } else {
        parse_selection_detection(detection_obj)?
    };

    Ok(Rule {
        id: raw.id,
        title: raw.title,
        severity: raw.severity,
        tags: raw.tags,
        detection,
    })
}

fn parse_selection_detection(
    detection: &serde_json::Map<String, serde_json::Value>,
) -> Result<Detection> {
    let condition_expr = detection
        .get("condition")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "missing 'condition' expression"))?
        .to_string();

    let mut selections: BTreeMap<String, Selection> = BTreeMap::new();
    for (name, value) in detection {
        if name == "condition" {
            continue;
        }
        selections.insert(name.clone(), build_selection(name, value)?);
    }

    Ok(Detection::Selection(parse_condition_expr(
        &condition_expr,
        &selections,
    )?))
}

fn build_selection(name: &str, value: &serde_json::Value) -> Result<Selection> {
    let obj = value.as_object().ok_or_else(|| {
        Error::new(
            ErrorCode::RuleCompilationError,
            format!("selection '{name}' must be a mapping of field -> expected"),
        )
    })?;
    let clauses = obj
        .iter()
        .map(|(path, expected)| Clause {
            path: path.clone(),
            matcher: Matcher::from_expected(expected),
        })
        .collect();
    Ok(Selection {
        name: name.to_string(),
        clauses,
    })
}

fn parse_condition_expr(expr: &str, selections: &BTreeMap<String, Selection>) -> Result<Node> {
    let expr = expr.trim();
    match expr {
        "all of them" => Ok(Node::AllOf(selections.values().cloned().collect())),
        "any of them" => Ok(Node::AnyOf(selections.values().cloned().collect())),
        single if selections.contains_key(single) => {
            Ok(Node::Leaf(selections[single].clone()))
        }
        _ => {
            if let Some((a, b)) = expr.split_once(" and ") {
                Ok(Node::And(
                    Box::new(Node::Leaf(lookup(selections, a.trim())?)),
                    Box::new(Node::Leaf(lookup(selections, b.trim())?)),
                ))
            } else if let Some((a, b)) = expr.split_once(" or ") {
                Ok(Node::Or(
                    Box::new(Node::Leaf(lookup(selections, a.trim())?)),
                    Box::new(Node::Leaf(lookup(selections, b.trim())?)),
                ))
            } else {
                Err(Error::new(
                    ErrorCode::RuleCompilationError,
                    format!("unrecognized condition expression '{expr}'"),
                ))
            }
        }
    }
}

fn lookup(selections: &BTreeMap<String, Selection>, name: &str) -> Result<Selection> {
    selections
        .get(name)
        .cloned()
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, format!("unknown selection '{name}'")))
}

fn parse_condition_detection(
    detection: &serde_json::Map<String, serde_json::Value>,
) -> Result<Detection> {
    let conditions_value = detection
        .get("conditions")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "'conditions' must be a list"))?;

    let conditions = conditions_value
        .iter()
        .map(parse_condition_clause)
        .collect::<Result<Vec<_>>>()?;

    let operator = match detection
        .get("operator")
        .and_then(|v| v.as_str())
        .unwrap_or("AND")
        .to_uppercase()
        .as_str()
    {
        "AND" => CombineOp::And,
        "OR" => CombineOp::Or,
        other => {
            return Err(Error::new(
                ErrorCode::RuleCompilationError,
                format!("unknown combine operator '{other}'"),
            ))
        }
    };

    Ok(Detection::Condition(ConditionRule {
        conditions,
        operator,
    }))
}

fn parse_condition_clause(value: &serde_json::Value) -> Result<ConditionClause> {
    let path = value
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "condition clause missing 'path'"))?
        .to_string();
    let op_str = value
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "condition clause missing 'op'"))?;
    let op = match op_str {
        "equals" => ConditionOp::Eq,
        "contains" => ConditionOp::Contains,
        "regex" => ConditionOp::Regex,
        "greater_than" => ConditionOp::Gt,
        "less_than" => ConditionOp::Lt,
        other => {
            return Err(Error::new(
                ErrorCode::RuleCompilationError,
                format!("unknown condition op '{other}'"),
            ))
        }
    };
    let clause_value = value
        .get("value")
        .cloned()
        .ok_or_else(|| Error::new(ErrorCode::RuleCompilationError, "condition clause missing 'value'"))?;

    Ok(ConditionClause {
        path,
        op,
        value: clause_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_selection_rule() {
        let yaml = r#"
id: rule-1
title: Failed authentication
severity: high
tags: [auth]
detection:
  sel:
    event_type: authentication
    data.status: failure
  condition: sel
"#;
        let rule = parse_rule(yaml).unwrap();
        assert_eq!(rule.id, "rule-1");
        let event = serde_json::json!({ "event_type": "authentication", "data": { "status": "failure" } });
        let (matched, matched_fields) = rule.detection.evaluate(&event);
        assert!(matched);
        assert_eq!(matched_fields, vec!["sel".to_string()]);
    }

    #[test]
    fn parses_condition_style_rule() {
        let yaml = r#"
id: rule-2
title: Large upload
severity: medium
detection:
  conditions:
    - path: bytes_out
      op: greater_than
      value: 1000000
  operator: AND
"#;
        let rule = parse_rule(yaml).unwrap();
        let event = serde_json::json!({ "bytes_out": 5_000_000 });
        let (matched, _) = rule.detection.evaluate(&event);
        assert!(matched);
    }

    #[test]
    fn all_of_them_requires_every_selection() {
        let yaml = r#"
id: rule-3
title: Compound
severity: low
detection:
  sel_1:
    action: login
  sel_2:
    result: failure
  condition: all of them
"#;
        let rule = parse_rule(yaml).unwrap();
        let success = serde_json::json!({ "action": "login", "result": "success" });
        let (matched, _) = rule.detection.evaluate(&success);
        assert!(!matched);
    }
}
