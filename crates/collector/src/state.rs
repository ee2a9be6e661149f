//! Shared ingestion-plane state (spec §4), assembled once at startup and
//! cloned into every handler. Grounded on the donor's `erp-api::state::AppState`.

use crate::parsers::LogParser;
use crate::producer::RedisStreamEventBus;
use crate::users::InMemoryUserStore;
use siem_core::{
    Config, EventBus, MetricsRegistry, PasswordHasher, PipelineMetrics, RateLimitStore,
    RedisRateLimitStore, Result, TokenService, UserStore,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub passwords: Arc<PasswordHasher>,
    pub users: Arc<dyn UserStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub event_bus: Arc<dyn EventBus>,
    pub parser: Arc<LogParser>,
    pub metrics: Arc<PipelineMetrics>,
    pub metrics_registry: Arc<MetricsRegistry>,
    pub redis: redis::aio::ConnectionManager,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let redis_client = redis::Client::open(config.redis.url())?;
        let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;

        let jwt_secret = config
            .auth
            .jwt_secret_key
            .clone()
            .unwrap_or_else(TokenService::generate_ephemeral_secret);
        let tokens = TokenService::new(&jwt_secret, config.auth.access_token_expire_minutes);

        let passwords = PasswordHasher::new(&config.security)?;
        let users = InMemoryUserStore::new(&config.security)?;
        let rate_limits = RedisRateLimitStore::new(redis_conn.clone());
        let event_bus = RedisStreamEventBus::new(redis_conn.clone());

        let metrics = PipelineMetrics::new(&config.metrics.namespace)
            .map_err(|e| siem_core::Error::internal(format!("failed to build metrics: {e}")))?;
        let metrics_registry = MetricsRegistry::new(config.metrics.clone());
        register_pipeline_metrics(&metrics_registry, &metrics);

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            passwords: Arc::new(passwords),
            users: Arc::new(users),
            rate_limits: Arc::new(rate_limits),
            event_bus: Arc::new(event_bus),
            parser: Arc::new(LogParser::new()),
            metrics: Arc::new(metrics),
            metrics_registry: Arc::new(metrics_registry),
            redis: redis_conn,
        })
    }
}

fn register_pipeline_metrics(registry: &MetricsRegistry, metrics: &PipelineMetrics) {
    let _ = registry.register(metrics.ingestion_requests_total.clone());
    let _ = registry.register(metrics.ingestion_request_duration_seconds.clone());
    let _ = registry.register(metrics.rate_limit_rejections_total.clone());
    let _ = registry.register(metrics.dedup_events_total.clone());
    let _ = registry.register(metrics.enrichment_provider_total.clone());
    let _ = registry.register(metrics.index_write_duration_seconds.clone());
    let _ = registry.register(metrics.index_write_failures_total.clone());
    let _ = registry.register(metrics.archive_write_failures_total.clone());
    let _ = registry.register(metrics.detection_alerts_total.clone());
    let _ = registry.register(metrics.playbook_action_total.clone());
    let _ = registry.register(metrics.login_attempts_total.clone());
    let _ = registry.register(metrics.login_failures_total.clone());
    let _ = registry.register(metrics.account_lockouts_total.clone());
}
