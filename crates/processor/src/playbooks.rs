//! Playbook engine (spec §4.N): for every alert, run each enabled playbook
//! whose triggers match, dispatching its actions in declared order to a
//! fixed handler table keyed by `ActionType` — never by reflection or
//! dynamic loading (spec §9).

use async_trait::async_trait;
use siem_core::{Alert, ActionType, Error, ErrorCode, Playbook, PlaybookAction, PipelineMetrics, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loads every `*.yml`/`*.yaml` playbook definition under `playbooks_dir`,
/// sorted by id for deterministic trigger-evaluation order.
pub fn load_playbooks(playbooks_dir: &str) -> Result<Vec<Playbook>> {
    let dir = Path::new(playbooks_dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut playbooks = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))? {
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
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
        let playbook: Playbook = serde_yaml::from_str(&contents)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
        playbooks.push(playbook);
    }
    playbooks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(playbooks)
}

fn action_type_label(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::CaseManagement => "case-management",
        ActionType::Analyzer => "analyzer",
        ActionType::Automation => "automation",
        ActionType::Custom => "custom",
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &PlaybookAction, alert: &Alert) -> Result<()>;
}

/// Dispatches `case-management`/`analyzer`/`automation` actions as an HTTP
/// POST against the matching `IntegrationsConfig` base URL, with the
/// action's `parameters` map as the JSON body.
pub struct HttpActionHandler {
    client: reqwest::Client,
    base_url: String,
}

impl HttpActionHandler {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ActionHandler for HttpActionHandler {
    async fn handle(&self, action: &PlaybookAction, alert: &Alert) -> Result<()> {
        let resp = self
            .client
            .post(&self.base_url)
            .json(&serde_json::json!({
                "action": action.name,
                "parameters": action.parameters,
                "alert_id": alert.id,
                "rule_id": alert.rule_id,
            }))
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::PlaybookActionFailed, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::new(
                ErrorCode::PlaybookActionFailed,
                format!("{} returned {}", self.base_url, resp.status()),
            ));
        }
        Ok(())
    }
}

/// Registry of custom action handlers, keyed by action name (spec §4.N:
/// custom actions resolve by name, not by type, since `ActionType::Custom`
/// alone does not say which behavior to run).
#[derive(Default)]
pub struct CustomHandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl CustomHandlerRegistry {
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(name)
    }
}

pub struct PlaybookEngine {
    playbooks: Vec<Playbook>,
    case_management: Option<Arc<dyn ActionHandler>>,
    analyzer: Option<Arc<dyn ActionHandler>>,
    automation: Option<Arc<dyn ActionHandler>>,
    custom: CustomHandlerRegistry,
    metrics: Arc<PipelineMetrics>,
}

impl PlaybookEngine {
    pub fn new(
        playbooks: Vec<Playbook>,
        case_management: Option<Arc<dyn ActionHandler>>,
        analyzer: Option<Arc<dyn ActionHandler>>,
        automation: Option<Arc<dyn ActionHandler>>,
        custom: CustomHandlerRegistry,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            playbooks,
            case_management,
            analyzer,
            automation,
            custom,
            metrics,
        }
    }

    /// Runs every matching playbook's actions against `alert`, one action at
    /// a time in declared order. A failed or timed-out action is logged and
    /// the engine proceeds to the next action — a stuck integration must
    /// never stall the rest of the playbook.
    pub async fn run(&self, alert: &Alert) {
        let alert_json = match serde_json::to_value(alert) {
            Ok(v) => v,
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "failed to serialize alert for playbook matching");
                return;
            }
        };

        for playbook in self.playbooks.iter().filter(|p| p.matches(&alert_json)) {
            info!(playbook_id = %playbook.id, alert_id = %alert.id, "playbook triggered");
            for action in &playbook.actions {
                if action.conditions.iter().any(|c| !c.matches(&alert_json)) {
                    continue;
                }
                self.run_action(playbook, action, alert).await;
            }
        }
    }

    async fn run_action(&self, playbook: &Playbook, action: &PlaybookAction, alert: &Alert) {
        let handler = match action.action_type {
            ActionType::CaseManagement => self.case_management.as_ref(),
            ActionType::Analyzer => self.analyzer.as_ref(),
            ActionType::Automation => self.automation.as_ref(),
            ActionType::Custom => self.custom.get(&action.name),
        };

        let Some(handler) = handler else {
            warn!(
                playbook_id = %playbook.id,
                action = %action.name,
                "no handler registered for action type, skipping"
            );
            return;
        };

        let label = action_type_label(action.action_type);
        match tokio::time::timeout(action.timeout(), handler.handle(action, alert)).await {
            Ok(Ok(())) => {
                info!(playbook_id = %playbook.id, action = %action.name, "action completed");
                self.record(label, "success");
            }
            Ok(Err(e)) => {
                error!(playbook_id = %playbook.id, action = %action.name, error = %e, "action failed");
                self.record(label, "failure");
            }
            Err(_) => {
                error!(
                    playbook_id = %playbook.id,
                    action = %action.name,
                    timeout_seconds = action.timeout_seconds,
                    "action timed out"
                );
                self.record(label, "timeout");
            }
        }
    }

    fn record(&self, action_type: &str, status: &str) {
        self.metrics
            .playbook_action_total
            .with_label_values(&[action_type, status])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siem_core::rules::condition::{ConditionClause, ConditionOp};
    use siem_core::{Event, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_metrics() -> Arc<PipelineMetrics> {
        Arc::new(PipelineMetrics::new("test_playbook_engine").unwrap())
    }

    fn alert(severity: Severity) -> Alert {
        Alert::new(
            "rule-1".to_string(),
            "test rule".to_string(),
            "test rule".to_string(),
            severity,
            Event {
                source: "test".to_string(),
                event_type: "authentication".to_string(),
                timestamp: None,
                severity: Severity::Info,
                vendor: None,
                data: serde_json::json!({}),
                metadata: Default::default(),
                enriched: None,
            },
            Vec::new(),
            Vec::new(),
        )
    }

    fn playbook_triggered_by_critical() -> Playbook {
        Playbook {
            id: "pb-1".to_string(),
            name: "escalate critical".to_string(),
            triggers: vec![ConditionClause {
                path: "severity".to_string(),
                op: ConditionOp::Eq,
                value: serde_json::json!("critical"),
            }],
            actions: vec![PlaybookAction {
                action_type: ActionType::Custom,
                name: "escalate".to_string(),
                parameters: Default::default(),
                conditions: vec![],
                timeout_seconds: 1,
            }],
            enabled: true,
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl ActionHandler for CountingHandler {
        async fn handle(&self, _action: &PlaybookAction, _alert: &Alert) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn matching_playbook_dispatches_its_custom_action() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut custom = CustomHandlerRegistry::default();
        custom.register("escalate", Arc::new(CountingHandler(count.clone())));

        let engine = PlaybookEngine::new(vec![playbook_triggered_by_critical()], None, None, None, custom, test_metrics());
        engine.run(&alert(Severity::Critical)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_matching_severity_does_not_dispatch() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut custom = CustomHandlerRegistry::default();
        custom.register("escalate", Arc::new(CountingHandler(count.clone())));

        let engine = PlaybookEngine::new(vec![playbook_triggered_by_critical()], None, None, None, custom, test_metrics());
        engine.run(&alert(Severity::Low)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    struct SlowHandler;

    #[async_trait]
    impl ActionHandler for SlowHandler {
        async fn handle(&self, _action: &PlaybookAction, _alert: &Alert) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_action_does_not_panic_the_engine() {
        let mut custom = CustomHandlerRegistry::default();
        custom.register("escalate", Arc::new(SlowHandler));
        let engine = PlaybookEngine::new(vec![playbook_triggered_by_critical()], None, None, None, custom, test_metrics());
        engine.run(&alert(Severity::Critical)).await;
    }
}
