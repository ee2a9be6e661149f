//! Core domain types shared by the ingestion and processing planes (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[cfg(feature = "axum")]
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};

/// Severity of an `Event`, a detection `Rule`, or an `Alert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    /// Used only by rule/alert severity, not Event severity, but kept in the
    /// same enum so rule matching and event matching share one ordering.
    High,
    Medium,
    Low,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Authorization scopes carried by access tokens (spec §3 User/Token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[serde(rename = "logs:write")]
    LogsWrite,
    #[serde(rename = "logs:read")]
    LogsRead,
    Admin,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::LogsWrite => "logs:write",
            Scope::LogsRead => "logs:read",
            Scope::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Scope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logs:write" => Ok(Scope::LogsWrite),
            "logs:read" => Ok(Scope::LogsRead),
            "admin" => Ok(Scope::Admin),
            _ => Err(()),
        }
    }
}

/// A principal: username, disabled flag, scope set, password hash (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub disabled: bool,
    pub scopes: Vec<Scope>,
}

impl User {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope) || self.scopes.contains(&Scope::Admin)
    }
}

/// Claims carried by an access token (spec §4.B): subject, scopes, issuance
/// instant, expiry, and optionally the issuing client IP for IP-binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub scopes: Vec<Scope>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub client_ip: Option<String>,
}

/// The canonical log record flowing through the pipeline (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Event {
    #[validate(length(min = 1, max = 255), regex(path = "SOURCE_RE"))]
    pub source: String,
    #[validate(length(min = 1, max = 100), regex(path = "SOURCE_RE"))]
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub severity: Severity,
    pub vendor: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Overlay attached by the Enricher (spec §4.I). Absent until enriched.
    #[serde(default)]
    pub enriched: Option<EnrichmentOverlay>,
}

lazy_static::lazy_static! {
    pub static ref SOURCE_RE: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

/// Maximum serialized size of an Event's `data` payload (spec §3).
pub const MAX_EVENT_DATA_BYTES: usize = 1024 * 1024;
/// Batch size bounds (spec §3).
pub const MIN_BATCH_EVENTS: usize = 1;
pub const MAX_BATCH_EVENTS: usize = 1000;
pub const MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;

impl Event {
    /// Normalizes the timestamp to UTC now if absent, as required before the
    /// producer writes the event (spec §3 invariants, §4.E).
    pub fn with_default_timestamp(mut self) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
        self
    }

    /// Serialized size of `data`, used to enforce the 1 MiB ceiling (spec §3).
    pub fn data_size(&self) -> usize {
        serde_json::to_vec(&self.data).map(|v| v.len()).unwrap_or(0)
    }
}

/// Enrichment overlay attached alongside `processing_timestamp` (spec §4.I).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentOverlay {
    pub processing_timestamp: Option<DateTime<Utc>>,
    pub ip_info: HashMap<String, GeoIpInfo>,
    pub dns_info: HashMap<String, DnsInfo>,
    pub threat_intel: HashMap<String, ThreatIntelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpInfo {
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsInfo {
    pub ip_addresses: Vec<String>,
    pub resolution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIntelInfo {
    pub score: f64,
    pub categories: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Field type declared by a `LogFormat` mapping (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Datetime,
    Json,
}

/// Named extractor: `{name, regex, field -> type mapping, sample}` (spec §3).
///
/// JSON-shaped formats (spec §4.D: suricata eve-JSON, crowdstrike
/// endpoint-JSON) set `json_required_fields` instead of relying on regex
/// capture groups: the line is decoded as JSON first and accepted as this
/// format only if every named key is present at the top level, so
/// registration stays uniform across regex- and JSON-shaped formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFormat {
    pub name: String,
    pub regex: String,
    pub fields: HashMap<String, FieldType>,
    pub sample: String,
    #[serde(default)]
    pub json_required_fields: Vec<String>,
}

impl LogFormat {
    pub fn is_json_shaped(&self) -> bool {
        !self.json_required_fields.is_empty()
    }
}

/// Detection-engine output (spec §3, §4.L): `id` is unique per `(rule,
/// instant)`, matching the prototype's alert-id derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub rule_name: String,
    pub source_event: Event,
    pub matched_fields: Vec<String>,
    pub tags: Vec<String>,
}

impl Alert {
    pub fn new(
        rule_id: impl Into<String>,
        rule_name: impl Into<String>,
        title: impl Into<String>,
        severity: Severity,
        source_event: Event,
        matched_fields: Vec<String>,
        tags: Vec<String>,
    ) -> Self {
        let rule_id = rule_id.into();
        let rule_name = rule_name.into();
        let title = title.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: format!("rule \"{rule_name}\" matched event from {}", source_event.source),
            title,
            severity,
            timestamp: Utc::now(),
            rule_id,
            rule_name,
            source_event,
            matched_fields,
            tags,
        }
    }
}

/// Request-scoped context: the authenticated principal plus the tracing
/// fields needed to correlate logs, metrics, and error reports for one
/// request. Attached to the request extensions by the auth middleware and
/// extracted by handlers; also the bridge into `error::ErrorContext`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub username: Option<String>,
    pub scopes: Vec<Scope>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            username: None,
            scopes: Vec::new(),
            source_ip: None,
            user_agent: None,
            correlation_id: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_principal(mut self, username: impl Into<String>, scopes: Vec<Scope>) -> Self {
        self.username = Some(username.into());
        self.scopes = scopes;
        self
    }

    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope) || self.scopes.contains(&Scope::Admin)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    /// Bridges to the error-reporting context carried on `Error` (spec §7).
    pub fn to_error_context(&self) -> crate::error::ErrorContext {
        let mut ctx = crate::error::ErrorContext::new().with_request_id(self.request_id.clone());
        if let Some(username) = &self.username {
            ctx = ctx.with_user_id(username.clone());
        }
        if let Some(source_ip) = &self.source_ip {
            ctx = ctx.with_metadata("source_ip", serde_json::Value::String(source_ip.clone()));
        }
        if let Some(user_agent) = &self.user_agent {
            ctx = ctx.with_metadata(
                "user_agent",
                serde_json::Value::String(user_agent.clone()),
            );
        }
        ctx
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod request_context_tests {
    use super::*;

    #[test]
    fn request_context_bridges_to_error_context() {
        let req = RequestContext::new()
            .with_principal("alice", vec![Scope::LogsWrite])
            .with_source_ip("10.0.0.1");
        let err_ctx = req.to_error_context();
        assert_eq!(err_ctx.user_id.as_deref(), Some("alice"));
        assert_eq!(
            err_ctx.metadata.get("source_ip").and_then(|v| v.as_str()),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn admin_scope_grants_all_checks() {
        let req = RequestContext::new().with_principal("root", vec![Scope::Admin]);
        assert!(req.has_scope(Scope::LogsWrite));
        assert!(req.has_scope(Scope::LogsRead));
    }
}

#[cfg(feature = "axum")]
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "authentication required" })),
                )
            })
    }
}
