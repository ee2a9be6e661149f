//! Per-event-type statistical anomaly scorer (spec §4.L: "ML anomaly
//! scoring"). The prototype trains an `IsolationForest` per event type; this
//! workspace replaces the model with a standardized-distance scorer loaded
//! from a small JSON fixture per event type, since the scoring contract
//! (feature vector → `score < threshold`, missing fields as zero) does not
//! require a learned model and pulling in a tensor/ML runtime would
//! contradict not fabricating dependencies the stack has no other use for.

use serde::Deserialize;
use siem_core::{Error, ErrorCode, Event, Result};
use std::collections::HashMap;
use std::path::Path;

/// Default anomaly threshold (spec §4.L): `score < threshold` flags an
/// anomaly.
pub const DEFAULT_THRESHOLD: f64 = -0.5;

#[derive(Debug, Clone, Deserialize)]
struct ModelFixture {
    event_type: String,
    features: Vec<String>,
    centroid: Vec<f64>,
    spread: Vec<f64>,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

pub struct AnomalyModel {
    pub features: Vec<String>,
    centroid: Vec<f64>,
    spread: Vec<f64>,
    pub threshold: f64,
}

impl AnomalyModel {
    /// Average absolute z-score across the declared feature list, negated so
    /// that a larger deviation yields a more negative score (matching the
    /// prototype's isolation-forest convention of negative == anomalous).
    pub fn score(&self, event: &Event) -> f64 {
        let mut total = 0.0;
        for (i, feature) in self.features.iter().enumerate() {
            let actual = navigate(&event.data, feature)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let spread = if self.spread[i] == 0.0 { 1.0 } else { self.spread[i] };
            total += ((actual - self.centroid[i]) / spread).abs();
        }
        -(total / self.features.len().max(1) as f64)
    }

    pub fn is_anomalous(&self, event: &Event) -> bool {
        self.score(event) < self.threshold
    }
}

fn navigate<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub struct AnomalyScorer {
    models: HashMap<String, AnomalyModel>,
}

impl AnomalyScorer {
    /// Loads `RULES_DIR/models/<event_type>.json` fixtures, one per modeled
    /// event type (spec §4.L: "authentication, network, process, file").
    pub fn load(rules_dir: &str) -> Result<Self> {
        let dir = Path::new(rules_dir).join("models");
        let mut models = HashMap::new();
        if !dir.is_dir() {
            return Ok(Self { models });
        }
        for entry in std::fs::read_dir(&dir)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?
        {
            let entry = entry.map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
            let fixture: ModelFixture = serde_json::from_str(&contents).map_err(Error::from)?;
            models.insert(
                fixture.event_type.clone(),
                AnomalyModel {
                    features: fixture.features,
                    centroid: fixture.centroid,
                    spread: fixture.spread,
                    threshold: fixture.threshold,
                },
            );
        }
        Ok(Self { models })
    }

    pub fn model_for(&self, event_type: &str) -> Option<&AnomalyModel> {
        self.models.get(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siem_core::Severity;

    fn event(data: serde_json::Value) -> Event {
        Event {
            source: "auth".to_string(),
            event_type: "authentication".to_string(),
            timestamp: None,
            severity: Severity::Info,
            vendor: None,
            data,
            metadata: Default::default(),
            enriched: None,
        }
    }

    #[test]
    fn large_deviation_from_centroid_is_anomalous() {
        let model = AnomalyModel {
            features: vec!["failed_attempts".to_string()],
            centroid: vec![1.0],
            spread: vec![1.0],
            threshold: DEFAULT_THRESHOLD,
        };
        let anomalous = event(serde_json::json!({ "failed_attempts": 50 }));
        assert!(model.is_anomalous(&anomalous));
    }

    #[test]
    fn near_centroid_is_not_anomalous() {
        let model = AnomalyModel {
            features: vec!["failed_attempts".to_string()],
            centroid: vec![1.0],
            spread: vec![1.0],
            threshold: DEFAULT_THRESHOLD,
        };
        let normal = event(serde_json::json!({ "failed_attempts": 1 }));
        assert!(!model.is_anomalous(&normal));
    }

    #[test]
    fn missing_feature_is_treated_as_zero() {
        let model = AnomalyModel {
            features: vec!["bytes_out".to_string()],
            centroid: vec![0.0],
            spread: vec![1.0],
            threshold: DEFAULT_THRESHOLD,
        };
        let event = event(serde_json::json!({}));
        assert!(!model.is_anomalous(&event));
    }
}
