use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};

/// Pipeline-wide metrics shared by the collector and processor binaries
/// (spec §10.4).
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    // Ingestion
    pub ingestion_requests_total: IntCounterVec,
    pub ingestion_request_duration_seconds: HistogramVec,

    // Rate limiting
    pub rate_limit_rejections_total: IntCounterVec,

    // Deduplication
    pub dedup_events_total: IntCounterVec,

    // Enrichment
    pub enrichment_provider_total: IntCounterVec,

    // Archival and indexing
    pub index_write_duration_seconds: HistogramVec,
    pub index_write_failures_total: IntCounterVec,
    pub archive_write_failures_total: IntCounterVec,

    // Detection and response
    pub detection_alerts_total: IntCounterVec,
    pub playbook_action_total: IntCounterVec,

    // Auth
    pub login_attempts_total: IntCounterVec,
    pub login_failures_total: IntCounterVec,
    pub account_lockouts_total: IntCounterVec,
}

impl PipelineMetrics {
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let ingestion_requests_total = IntCounterVec::new(
            Opts::new(
                format!("{}_ingestion_requests_total", namespace),
                "Total number of ingestion HTTP requests",
            ),
            &["route", "status"],
        )?;

        let ingestion_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                format!("{}_ingestion_request_duration_seconds", namespace),
                "Time spent handling ingestion HTTP requests",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["route"],
        )?;

        let rate_limit_rejections_total = IntCounterVec::new(
            Opts::new(
                format!("{}_rate_limit_rejections_total", namespace),
                "Total number of requests rejected by the rate limiter",
            ),
            &["dimension"],
        )?;

        let dedup_events_total = IntCounterVec::new(
            Opts::new(
                format!("{}_dedup_events_total", namespace),
                "Total number of events processed by the deduplicator",
            ),
            &["result"],
        )?;

        let enrichment_provider_total = IntCounterVec::new(
            Opts::new(
                format!("{}_enrichment_provider_total", namespace),
                "Total number of enrichment lookups by provider and outcome",
            ),
            &["provider", "status"],
        )?;

        let index_write_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                format!("{}_index_write_duration_seconds", namespace),
                "Time spent writing a batch to the index",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["index"],
        )?;

        let index_write_failures_total = IntCounterVec::new(
            Opts::new(
                format!("{}_index_write_failures_total", namespace),
                "Total number of failed index write batches",
            ),
            &["index"],
        )?;

        let archive_write_failures_total = IntCounterVec::new(
            Opts::new(
                format!("{}_archive_write_failures_total", namespace),
                "Total number of failed archive object writes",
            ),
            &["bucket"],
        )?;

        let detection_alerts_total = IntCounterVec::new(
            Opts::new(
                format!("{}_detection_alerts_total", namespace),
                "Total number of alerts emitted by rule kind",
            ),
            &["rule_kind", "severity"],
        )?;

        let playbook_action_total = IntCounterVec::new(
            Opts::new(
                format!("{}_playbook_action_total", namespace),
                "Total number of playbook action executions by type and outcome",
            ),
            &["action_type", "status"],
        )?;

        let login_attempts_total = IntCounterVec::new(
            Opts::new(
                format!("{}_login_attempts_total", namespace),
                "Total number of login attempts",
            ),
            &["status"],
        )?;

        let login_failures_total = IntCounterVec::new(
            Opts::new(
                format!("{}_login_failures_total", namespace),
                "Total number of failed logins",
            ),
            &["reason"],
        )?;

        let account_lockouts_total = IntCounterVec::new(
            Opts::new(
                format!("{}_account_lockouts_total", namespace),
                "Total number of account lockouts",
            ),
            &["username"],
        )?;

        Ok(Self {
            ingestion_requests_total,
            ingestion_request_duration_seconds,
            rate_limit_rejections_total,
            dedup_events_total,
            enrichment_provider_total,
            index_write_duration_seconds,
            index_write_failures_total,
            archive_write_failures_total,
            detection_alerts_total,
            playbook_action_total,
            login_attempts_total,
            login_failures_total,
            account_lockouts_total,
        })
    }

    pub fn register_all(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.ingestion_requests_total.clone()))?;
        registry.register(Box::new(self.ingestion_request_duration_seconds.clone()))?;
        registry.register(Box::new(self.rate_limit_rejections_total.clone()))?;
        registry.register(Box::new(self.dedup_events_total.clone()))?;
        registry.register(Box::new(self.enrichment_provider_total.clone()))?;
        registry.register(Box::new(self.index_write_duration_seconds.clone()))?;
        registry.register(Box::new(self.index_write_failures_total.clone()))?;
        registry.register(Box::new(self.archive_write_failures_total.clone()))?;
        registry.register(Box::new(self.detection_alerts_total.clone()))?;
        registry.register(Box::new(self.playbook_action_total.clone()))?;
        registry.register(Box::new(self.login_attempts_total.clone()))?;
        registry.register(Box::new(self.login_failures_total.clone()))?;
        registry.register(Box::new(self.account_lockouts_total.clone()))?;

        Ok(())
    }
}
