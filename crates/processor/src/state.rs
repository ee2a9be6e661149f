//! Shared processing-plane state (spec §4), assembled once at startup.
//! Grounded on `siem-collector::state::AppState`'s assembly shape.

use crate::alerts::{AlertDispatcher, EmailChannel, NotificationChannel, WebhookChannel};
use crate::archiver::HttpObjectStore;
use crate::bus::RedisStreamEventBus;
use crate::dedup::Deduplicator;
use crate::detection::anomaly::AnomalyScorer;
use crate::detection::rule_loader;
use crate::detection::signature;
use crate::detection::DetectionEngine;
use crate::enricher::Enricher;
use crate::index_writer::HttpIndexWriter;
use crate::playbooks::{self, CustomHandlerRegistry, HttpActionHandler, PlaybookEngine};
use crate::providers::{HttpThreatIntelClient, NullGeoIpReader, TokioDnsResolver};
use siem_core::{Config, EventBus, IndexWriter, MetricsRegistry, ObjectStore, PipelineMetrics, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProcessorState {
    pub config: Arc<Config>,
    pub event_bus: Arc<dyn EventBus>,
    pub dedup: Deduplicator,
    pub enricher: Arc<Enricher>,
    pub detection: Arc<DetectionEngine>,
    pub object_store: Arc<dyn ObjectStore>,
    pub index_writer: Arc<dyn IndexWriter>,
    pub alerts: Arc<AlertDispatcher>,
    pub playbooks: Arc<PlaybookEngine>,
    pub metrics: Arc<PipelineMetrics>,
    pub metrics_registry: Arc<MetricsRegistry>,
    pub redis: redis::aio::ConnectionManager,
}

impl ProcessorState {
    pub async fn new(config: Config) -> Result<Self> {
        let redis_client = redis::Client::open(config.redis.url())?;
        let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
        let event_bus = RedisStreamEventBus::new(redis_conn.clone());

        let metrics = Arc::new(
            PipelineMetrics::new(&config.metrics.namespace)
                .map_err(|e| siem_core::Error::internal(format!("failed to build metrics: {e}")))?,
        );
        let metrics_registry = MetricsRegistry::new(config.metrics.clone());
        register_pipeline_metrics(&metrics_registry, &metrics);

        let dedup = Deduplicator::new();

        let enricher = Arc::new(Enricher::new(
            Arc::new(NullGeoIpReader),
            Arc::new(TokioDnsResolver),
            Arc::new(HttpThreatIntelClient::new(config.enrichment.threat_intel_providers.clone())),
            metrics.clone(),
            config.enrichment.deadline_ms,
        ));

        let rules = rule_loader::load_rules(&config.rules.rules_dir)?;
        let signatures = signature::load_signatures(&config.rules.rules_dir)?;
        let anomaly = AnomalyScorer::load(&config.rules.rules_dir)?;
        let detection = Arc::new(DetectionEngine::new(rules, signatures, anomaly, metrics.clone()));

        let object_store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
            config.archive.endpoint.clone(),
            config.archive.access_key.clone(),
            config.archive.secret_key.clone(),
        ));

        let index_writer: Arc<dyn IndexWriter> = Arc::new(HttpIndexWriter::new(
            config.index.hosts.clone(),
            config.index.username.clone(),
            config.index.password.clone(),
        ));
        index_writer.ensure_bootstrap(&config.index.index_prefix).await?;

        let alerts = Arc::new(build_alert_dispatcher(&config));
        let playbook_defs = playbooks::load_playbooks(&config.rules.playbooks_dir)?;
        let playbook_engine = Arc::new(PlaybookEngine::new(
            playbook_defs,
            config
                .integrations
                .case_management_base_url
                .clone()
                .map(|url| Arc::new(HttpActionHandler::new(url)) as Arc<dyn playbooks::ActionHandler>),
            config
                .integrations
                .analyzer_base_url
                .clone()
                .map(|url| Arc::new(HttpActionHandler::new(url)) as Arc<dyn playbooks::ActionHandler>),
            config
                .integrations
                .automation_base_url
                .clone()
                .map(|url| Arc::new(HttpActionHandler::new(url)) as Arc<dyn playbooks::ActionHandler>),
            CustomHandlerRegistry::default(),
            metrics.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            event_bus: Arc::new(event_bus),
            dedup,
            enricher,
            detection,
            object_store,
            index_writer,
            alerts,
            playbooks: playbook_engine,
            metrics,
            metrics_registry: Arc::new(metrics_registry),
            redis: redis_conn,
        })
    }
}

fn build_alert_dispatcher(config: &Config) -> AlertDispatcher {
    let mut channels: Vec<(&'static str, Arc<dyn NotificationChannel>)> = Vec::new();

    if let Ok(email) = EmailChannel::new(config.email.clone(), config.email.alert_recipients.clone()) {
        channels.push(("email", Arc::new(email)));
    }
    if let Some(url) = &config.integrations.chat_webhook_url {
        channels.push(("chat", Arc::new(WebhookChannel::new("chat", url.clone()))));
    }
    if let Some(url) = &config.integrations.im_webhook_url {
        channels.push(("im", Arc::new(WebhookChannel::new("im", url.clone()))));
    }

    AlertDispatcher::new(channels)
}

fn register_pipeline_metrics(registry: &MetricsRegistry, metrics: &PipelineMetrics) {
    let _ = registry.register(metrics.dedup_events_total.clone());
    let _ = registry.register(metrics.enrichment_provider_total.clone());
    let _ = registry.register(metrics.index_write_duration_seconds.clone());
    let _ = registry.register(metrics.index_write_failures_total.clone());
    let _ = registry.register(metrics.archive_write_failures_total.clone());
    let _ = registry.register(metrics.detection_alerts_total.clone());
    let _ = registry.register(metrics.playbook_action_total.clone());
}
