//! Selection-style rule IR: `{And, Or, Leaf}` over named selections, each a
//! list of `{path, matcher}` clauses (spec §4.L, §9).

use serde_json::Value;

/// How a clause's expected value is compared against the event field.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Equal(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    AnyOf(Vec<Matcher>),
}

impl Matcher {
    /// Builds a matcher from a rule's raw expected value: a string using
    /// the `*X*` / `*X` / `X*` glob shorthand, or a list (disjunction).
    pub fn from_expected(expected: &Value) -> Self {
        match expected {
            Value::Array(items) => {
                Matcher::AnyOf(items.iter().map(Matcher::from_expected).collect())
            }
            Value::String(s) => Self::from_glob_string(s),
            other => Self::from_glob_string(&coerce_to_string(other)),
        }
    }

    fn from_glob_string(s: &str) -> Self {
        if s.len() >= 2 && s.starts_with('*') && s.ends_with('*') {
            Matcher::Contains(s[1..s.len() - 1].to_string())
        } else if let Some(stripped) = s.strip_prefix('*') {
            Matcher::Suffix(stripped.to_string())
        } else if let Some(stripped) = s.strip_suffix('*') {
            Matcher::Prefix(stripped.to_string())
        } else {
            Matcher::Equal(s.to_string())
        }
    }

    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Matcher::Equal(expected) => actual == expected,
            Matcher::Prefix(prefix) => actual.starts_with(prefix.as_str()),
            Matcher::Suffix(suffix) => actual.ends_with(suffix.as_str()),
            Matcher::Contains(needle) => actual.contains(needle.as_str()),
            Matcher::AnyOf(matchers) => matchers.iter().any(|m| m.matches(actual)),
        }
    }
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One `field → expected` entry of a selection.
#[derive(Debug, Clone)]
pub struct Clause {
    pub path: String,
    pub matcher: Matcher,
}

impl Clause {
    /// Navigates `root` by `path`'s dot-separated segments. A missing
    /// segment matches nothing (spec §4.L).
    pub fn matches(&self, root: &Value) -> bool {
        let Some(value) = navigate(root, &self.path) else {
            return false;
        };
        self.matcher.matches(&coerce_to_string(value))
    }
}

fn navigate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// A named group of clauses; all clauses must match (spec §4.L).
#[derive(Debug, Clone)]
pub struct Selection {
    pub name: String,
    pub clauses: Vec<Clause>,
}

impl Selection {
    pub fn matches(&self, root: &Value) -> bool {
        self.clauses.iter().all(|c| c.matches(root))
    }
}

/// The boolean tree a rule's `condition` expression compiles to: `all of
/// them` / `any of them` / `<A> and <B>` / `<A> or <B>` (spec §4.L).
#[derive(Debug, Clone)]
pub enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    AllOf(Vec<Selection>),
    AnyOf(Vec<Selection>),
    Leaf(Selection),
}

/// Result of evaluating a rule's `Node` against one event: whether it
/// matched, and which named selections matched (spec §4.L: "matched_fields
/// = the subset of selection clauses that matched").
#[derive(Debug, Clone)]
pub struct SelectionMatch {
    pub matched: bool,
    pub matched_selections: Vec<String>,
}

impl Node {
    pub fn evaluate(&self, root: &Value) -> SelectionMatch {
        match self {
            Node::Leaf(selection) => {
                let matched = selection.matches(root);
                SelectionMatch {
                    matched,
                    matched_selections: if matched {
                        vec![selection.name.clone()]
                    } else {
                        Vec::new()
                    },
                }
            }
            Node::AllOf(selections) => {
                let matched_selections: Vec<String> = selections
                    .iter()
                    .filter(|s| s.matches(root))
                    .map(|s| s.name.clone())
                    .collect();
                SelectionMatch {
                    matched: matched_selections.len() == selections.len(),
                    matched_selections,
                }
            }
            Node::AnyOf(selections) => {
                let matched_selections: Vec<String> = selections
                    .iter()
                    .filter(|s| s.matches(root))
                    .map(|s| s.name.clone())
                    .collect();
                SelectionMatch {
                    matched: !matched_selections.is_empty(),
                    matched_selections,
                }
            }
            Node::And(left, right) => {
                let l = left.evaluate(root);
                let r = right.evaluate(root);
                let mut matched_selections = l.matched_selections;
                matched_selections.extend(r.matched_selections);
                SelectionMatch {
                    matched: l.matched && r.matched,
                    matched_selections,
                }
            }
            Node::Or(left, right) => {
                let l = left.evaluate(root);
                let r = right.evaluate(root);
                let mut matched_selections = l.matched_selections;
                matched_selections.extend(r.matched_selections);
                SelectionMatch {
                    matched: l.matched || r.matched,
                    matched_selections,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(name: &str, path: &str, expected: &str) -> Selection {
        Selection {
            name: name.to_string(),
            clauses: vec![Clause {
                path: path.to_string(),
                matcher: Matcher::from_expected(&Value::String(expected.to_string())),
            }],
        }
    }

    #[test]
    fn contains_glob_matches_substring() {
        let matcher = Matcher::from_expected(&Value::String("*fail*".to_string()));
        assert!(matcher.matches("login failure"));
        assert!(!matcher.matches("login ok"));
    }

    #[test]
    fn missing_path_segment_does_not_match() {
        let root = serde_json::json!({ "user": { "name": "alice" } });
        let clause = Clause {
            path: "user.id".to_string(),
            matcher: Matcher::Equal("123".to_string()),
        };
        assert!(!clause.matches(&root));
    }

    #[test]
    fn all_of_requires_every_selection() {
        let root = serde_json::json!({ "action": "login", "result": "failure" });
        let node = Node::AllOf(vec![
            sel("sel_1", "action", "login"),
            sel("sel_2", "result", "failure"),
        ]);
        let result = node.evaluate(&root);
        assert!(result.matched);
        assert_eq!(result.matched_selections.len(), 2);
    }

    #[test]
    fn any_of_matches_on_partial_hit() {
        let root = serde_json::json!({ "action": "login", "result": "success" });
        let node = Node::AnyOf(vec![
            sel("sel_1", "action", "login"),
            sel("sel_2", "result", "failure"),
        ]);
        let result = node.evaluate(&root);
        assert!(result.matched);
        assert_eq!(result.matched_selections, vec!["sel_1".to_string()]);
    }
}
