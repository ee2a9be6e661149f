//! Detection engine orchestration (spec §4.L): holds the three rule
//! collections plus the anomaly scorers and walks them against each enriched
//! event in the deterministic order the spec requires — "all selection
//! matches (ascending rule id), then all condition matches, then signature
//! matches, then anomaly alerts."

use super::anomaly::AnomalyScorer;
use super::signature::{self, Signature};
use base64::Engine as _;
use siem_core::{Alert, Detection, Event, PipelineMetrics, Rule, Severity};
use std::sync::Arc;
use tracing::debug;

pub struct DetectionEngine {
    /// Sorted ascending by id at load time (spec §4.L); filtering by
    /// `Detection` variant below preserves that order within each pass.
    rules: Vec<Rule>,
    signatures: Vec<Signature>,
    anomaly: AnomalyScorer,
    metrics: Arc<PipelineMetrics>,
}

impl DetectionEngine {
    pub fn new(
        rules: Vec<Rule>,
        signatures: Vec<Signature>,
        anomaly: AnomalyScorer,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            rules,
            signatures,
            anomaly,
            metrics,
        }
    }

    pub fn evaluate(&self, event: &Event) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for rule in self.rules.iter().filter(|r| matches!(r.detection, Detection::Selection(_))) {
            self.evaluate_rule(rule, event, "selection", &mut alerts);
        }
        for rule in self.rules.iter().filter(|r| matches!(r.detection, Detection::Condition(_))) {
            self.evaluate_rule(rule, event, "condition", &mut alerts);
        }

        self.evaluate_signatures(event, &mut alerts);
        self.evaluate_anomaly(event, &mut alerts);

        alerts
    }

    fn evaluate_rule(&self, rule: &Rule, event: &Event, kind: &str, alerts: &mut Vec<Alert>) {
        let event_value = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        let (matched, matched_fields) = rule.detection.evaluate(&event_value);
        if !matched {
            return;
        }
        debug!(rule_id = %rule.id, kind, "rule matched");
        self.record(kind, rule.severity);
        alerts.push(Alert::new(
            rule.id.clone(),
            rule.title.clone(),
            rule.title.clone(),
            rule.severity,
            event.clone(),
            matched_fields,
            rule.tags.clone(),
        ));
    }

    fn evaluate_signatures(&self, event: &Event, alerts: &mut Vec<Alert>) {
        let Some(blob) = extract_file_blob(event) else {
            return;
        };
        for pattern_id in signature::scan(&self.signatures, &blob) {
            self.record("signature", Severity::High);
            alerts.push(Alert::new(
                pattern_id.clone(),
                format!("content signature match: {pattern_id}"),
                format!("content signature match: {pattern_id}"),
                Severity::High,
                event.clone(),
                Vec::new(),
                vec!["signature".to_string()],
            ));
        }
    }

    fn evaluate_anomaly(&self, event: &Event, alerts: &mut Vec<Alert>) {
        let Some(model) = self.anomaly.model_for(&event.event_type) else {
            return;
        };
        if model.is_anomalous(event) {
            self.record("anomaly", Severity::Medium);
            let rule_id = format!("anomaly:{}", event.event_type);
            alerts.push(Alert::new(
                rule_id,
                format!("anomalous {} event", event.event_type),
                format!("anomalous {} event", event.event_type),
                Severity::Medium,
                event.clone(),
                model.features.clone(),
                vec!["anomaly".to_string()],
            ));
        }
    }

    fn record(&self, rule_kind: &str, severity: Severity) {
        self.metrics
            .detection_alerts_total
            .with_label_values(&[rule_kind, &severity.to_string()])
            .inc();
    }
}

/// Looks for a `file_blob` field in the event's data tree, base64-decoding
/// it if it decodes cleanly and falling back to the raw UTF-8 bytes
/// otherwise.
fn extract_file_blob(event: &Event) -> Option<Vec<u8>> {
    let raw = event.data.get("file_blob")?.as_str()?;
    Some(
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .unwrap_or_else(|_| raw.as_bytes().to_vec()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::rule_loader::parse_rule;

    fn event(event_type: &str, data: serde_json::Value) -> Event {
        Event {
            source: "test-system".to_string(),
            event_type: event_type.to_string(),
            timestamp: None,
            severity: Severity::Info,
            vendor: None,
            data,
            metadata: Default::default(),
            enriched: None,
        }
    }

    fn metrics() -> Arc<PipelineMetrics> {
        Arc::new(PipelineMetrics::new("test_detection_engine").unwrap())
    }

    #[test]
    fn selection_rule_emits_exactly_one_alert_on_match() {
        let rule = parse_rule(
            r#"
id: rule-1
title: Failed auth
severity: high
detection:
  sel:
    event_type: authentication
    data.status: failure
  condition: sel
"#,
        )
        .unwrap();
        let engine = DetectionEngine::new(vec![rule], Vec::new(), AnomalyScorer::load("/nonexistent").unwrap(), metrics());

        let failure = event("authentication", serde_json::json!({ "status": "failure" }));
        let alerts = engine.evaluate(&failure);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);

        let success = event("authentication", serde_json::json!({ "status": "success" }));
        assert!(engine.evaluate(&success).is_empty());
    }

    #[test]
    fn alerts_are_ordered_selection_then_condition() {
        let selection_rule = parse_rule(
            r#"
id: rule-b
title: Selection rule
severity: medium
detection:
  sel:
    event_type: network
  condition: sel
"#,
        )
        .unwrap();
        let condition_rule = parse_rule(
            r#"
id: rule-a
title: Condition rule
severity: low
detection:
  conditions:
    - path: event_type
      op: equals
      value: network
  operator: AND
"#,
        )
        .unwrap();
        // rule-a sorts before rule-b alphabetically but the engine must still
        // emit the selection match first, per the spec's ordering contract.
        let engine = DetectionEngine::new(
            vec![condition_rule, selection_rule],
            Vec::new(),
            AnomalyScorer::load("/nonexistent").unwrap(),
            metrics(),
        );
        let e = event("network", serde_json::json!({}));
        let alerts = engine.evaluate(&e);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].rule_id, "rule-b");
        assert_eq!(alerts[1].rule_id, "rule-a");
    }
}
