//! Hierarchical configuration for the ingestion and detection pipeline.
//!
//! Values are loaded from three sources in order of increasing precedence:
//!
//! 1. **Default configuration** (`config/default.toml`) — base values.
//! 2. **Environment-specific configuration** (`config/{environment}.toml`).
//! 3. **Environment variables** — runtime overrides, highest precedence.
//!
//! The environment is selected by the `ENVIRONMENT` variable (`development`,
//! `testing`, `production`; defaults to `development`).
//!
//! ```rust,no_run
//! use siem_core::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Top-level configuration aggregate. Populated once at process startup and
/// shared (cloned, since every field is cheap) across the pipeline's tasks.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Ingestion HTTP server binding.
    pub server: ServerConfig,
    /// CORS policy for the ingestion HTTP surface.
    pub cors: CorsConfig,
    /// Event-bus producer/consumer connection settings.
    pub event_bus: EventBusConfig,
    /// Search-index writer connection settings.
    pub index: IndexConfig,
    /// Auth gatekeeper signing key and lockout policy.
    pub auth: AuthConfig,
    /// Rate-limiter KV connection settings.
    pub redis: RedisConfig,
    /// Declarative rule/playbook source directories.
    pub rules: RulesConfig,
    /// Password hashing cost parameters.
    pub security: SecurityConfig,
    /// Alert dispatcher email channel settings.
    pub email: EmailConfig,
    /// Prometheus metrics exposition settings.
    pub metrics: MetricsConfig,
    /// Cold-storage archiver connection settings.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Enricher provider endpoints and deadlines.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Deduplicator cache sweep interval.
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Playbook action handler endpoints (analyzer/automation/case
    /// management/chat-im webhooks).
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    /// Environment name and log level.
    pub app: AppConfig,
}

/// `COLLECTOR_HOST` / `COLLECTOR_PORT` (spec §6).
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// CORS policy. Production deployments must configure a single restrictive
/// origin via `FRONTEND_URL`; a wildcard is accepted only outside production
/// (spec §9 Open Question — the restrictive form is the resolved default).
#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub frontend_url: String,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

/// `KAFKA_BOOTSTRAP_SERVERS, KAFKA_SECURITY_PROTOCOL, KAFKA_SASL_*,
/// KAFKA_SSL_*, RAW_LOGS_TOPIC` (spec §6). Field names are kept close to the
/// upstream broker's vocabulary even though the shipped transport targets
/// Redis Streams (see `siem_core::collaborators::EventBus`), since the
/// pipeline is expected to run against a Kafka-compatible broker in
/// production and this is the contract callers configure against.
#[derive(Debug, Deserialize, Clone)]
pub struct EventBusConfig {
    pub bootstrap_servers: String,
    pub security_protocol: String,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub ssl_ca_location: Option<String>,
    pub raw_logs_topic: String,
    pub consumer_group: String,
}

/// `ES_HOSTS, ES_USERNAME, ES_PASSWORD, ES_SSL_VERIFY, ES_INDEX_PREFIX`.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub hosts: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_verify: bool,
    pub index_prefix: String,
}

/// `JWT_SECRET_KEY, ACCESS_TOKEN_EXPIRE_MINUTES, MAX_FAILED_LOGIN_ATTEMPTS,
/// LOCKOUT_DURATION_MINUTES` (spec §4.B, §6).
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Signing key for access tokens. If absent at load time a random
    /// per-process key is generated and a warning is surfaced — tokens then
    /// do not survive a restart (spec §4.B, §9). Required in production.
    pub jwt_secret_key: Option<String>,
    pub access_token_expire_minutes: i64,
    pub max_failed_login_attempts: u32,
    pub lockout_duration_minutes: i64,
}

/// `REDIS_HOST, REDIS_PORT` (spec §6) — the rate-limit counter KV.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// `RULES_DIR` (with `sigma/`, `yara/`, `custom/` subdirs), `PLAYBOOKS_DIR`.
#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    pub rules_dir: String,
    pub playbooks_dir: String,
}

/// Argon2id cost parameters for the auth gatekeeper's password hashing.
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub argon2_memory_cost: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
}

/// Alert dispatcher email channel (spec §4.M).
#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub provider: String, // "mock" or "smtp"
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub use_starttls: bool,
    #[serde(default)]
    pub alert_recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            smtp_host: None,
            smtp_port: Some(587),
            smtp_username: None,
            smtp_password: None,
            from_address: "siem-alerts@example.com".to_string(),
            use_starttls: true,
            alert_recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
}

/// Cold-storage target for the Archiver (spec §4.J). Both recognized
/// backends (`object-store-S3`, `object-store-MinIO`) speak the same
/// path-style HTTP PUT contract, so one config shape covers either.
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:9000".to_string(),
            bucket: "siem-archive".to_string(),
            access_key: None,
            secret_key: None,
        }
    }
}

/// One configured threat-intel provider (spec §4.I): queried over HTTP with
/// an API key.
#[derive(Debug, Deserialize, Clone)]
pub struct ThreatIntelProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Enricher provider endpoints and the combined per-event deadline (spec
/// §4.I).
#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    pub geoip_db_path: Option<String>,
    #[serde(default)]
    pub threat_intel_providers: Vec<ThreatIntelProviderConfig>,
    pub deadline_ms: u64,
    pub dns_timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            geoip_db_path: None,
            threat_intel_providers: Vec::new(),
            deadline_ms: 2000,
            dns_timeout_ms: 500,
        }
    }
}

/// Deduplicator cache sweep interval (spec §4.H, default 3600 s).
#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    pub cache_cleanup_interval_seconds: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cache_cleanup_interval_seconds: 3600,
        }
    }
}

/// Base URLs for the playbook engine's external action handlers (spec
/// §4.N) and the alert dispatcher's chat/im webhook channels (spec §4.M).
#[derive(Debug, Deserialize, Clone)]
pub struct IntegrationsConfig {
    pub chat_webhook_url: Option<String>,
    pub im_webhook_url: Option<String>,
    pub case_management_base_url: Option<String>,
    pub analyzer_base_url: Option<String>,
    pub automation_base_url: Option<String>,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            chat_webhook_url: None,
            im_webhook_url: None,
            case_management_base_url: None,
            analyzer_base_url: None,
            automation_base_url: None,
        }
    }
}

/// Per-principal rate/batch/event limits (`RATE_LIMIT_<USER>`,
/// `BATCH_LIMIT_<USER>`, `EVENT_LIMIT_<USER>`, spec §4.C). These are sparse,
/// keyed by an arbitrary uppercase username, so they are resolved directly
/// from the process environment at lookup time rather than through the
/// typed `Config` struct — mirroring the prototype's own
/// `os.environ.get(f"RATE_LIMIT_{user.upper()}", default)` pattern.
pub struct PerUserLimits;

impl PerUserLimits {
    pub fn rate_limit(username: &str, default: u32) -> u32 {
        Self::lookup(&format!("RATE_LIMIT_{}", username.to_uppercase()), default)
    }

    pub fn batch_limit(username: &str, default: u32) -> u32 {
        Self::lookup(&format!("BATCH_LIMIT_{}", username.to_uppercase()), default)
    }

    pub fn event_limit(username: &str, default: u32) -> u32 {
        Self::lookup(&format!("EVENT_LIMIT_{}", username.to_uppercase()), default)
    }

    fn lookup(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

impl Config {
    /// Loads configuration from `config/default.toml`,
    /// `config/{ENVIRONMENT}.toml`, then environment variables, in that
    /// order of precedence, and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("").separator("__"));

        let built = builder.build()?;
        let mut loaded: Config = built.try_deserialize()?;
        loaded.validate(&environment)?;
        Ok(loaded)
    }

    /// Fails fast on insecure or missing settings. Strict checks only apply
    /// in production; development/testing tolerate generated defaults.
    fn validate(&mut self, environment: &str) -> Result<(), ConfigError> {
        if let Some(secret) = &self.auth.jwt_secret_key {
            if secret.len() < 32 && environment == "production" {
                return Err(ConfigError::Message(format!(
                    "JWT_SECRET_KEY must be at least 32 characters long (current: {})",
                    secret.len()
                )));
            }
        } else if environment == "production" {
            return Err(ConfigError::Message(
                "JWT_SECRET_KEY is required in production deployments".to_string(),
            ));
        }

        if environment == "production" {
            self.validate_production_security()?;
        }

        if self.auth.access_token_expire_minutes <= 0 || self.auth.access_token_expire_minutes > 60
        {
            if environment == "production" {
                return Err(ConfigError::Message(
                    "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and 60 in production"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    fn validate_production_security(&self) -> Result<(), ConfigError> {
        if self.cors.frontend_url == "*" {
            return Err(ConfigError::Message(
                "Production deployments must not use a wildcard CORS origin; set FRONTEND_URL"
                    .to_string(),
            ));
        }

        if self.email.provider != "mock" {
            if self.email.smtp_host.is_none() {
                return Err(ConfigError::Message(
                    "SMTP_HOST is required when email.provider is not 'mock'".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_user_limits_fall_back_to_default() {
        let v = PerUserLimits::rate_limit("nonexistent_user_xyz", 1000);
        assert_eq!(v, 1000);
    }
}
