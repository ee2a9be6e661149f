//! Severity-gated cold-storage archival (spec §4.J).
//!
//! Out of scope per spec §1 is the object store itself; `ObjectStore` is
//! implemented here against a path-style S3/MinIO-compatible HTTP PUT
//! endpoint via `reqwest`, since no S3 SDK is part of this workspace's
//! dependency stack.

use async_trait::async_trait;
use chrono::Utc;
use siem_core::{Error, Event, ObjectStore, PipelineMetrics, Result, Severity};
use std::sync::Arc;
use tracing::{error, warn};

/// Severity ∈ {critical, high} OR event_type contains one of
/// {attack, threat, security} (spec §4.J).
pub fn should_archive(event: &Event) -> bool {
    matches!(event.severity, Severity::Critical | Severity::High)
        || ["attack", "threat", "security"]
            .iter()
            .any(|needle| event.event_type.contains(needle))
}

/// `YYYY/MM/DD/<source>/HHMMSS-<event_id>.json` (spec §4.J).
pub fn object_key(event: &Event, event_id: &str) -> String {
    let ts = event.timestamp.unwrap_or_else(Utc::now);
    format!(
        "{}/{}/{}",
        ts.format("%Y/%m/%d"),
        event.source,
        format!("{}-{}.json", ts.format("%H%M%S"), event_id)
    )
}

pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, access_key: Option<String>, secret_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_key,
            secret_key,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), bucket, key);
        let mut req = self
            .client
            .put(&url)
            .header("content-type", "application/json")
            .body(body);
        if let (Some(access_key), Some(secret_key)) = (&self.access_key, &self.secret_key) {
            // Path-style basic auth; a full implementation would sign with
            // SigV4, left out since nothing in this workspace's stack
            // provides that signer.
            req = req.basic_auth(access_key, Some(secret_key));
        }

        let resp = req.send().await.map_err(|e| {
            Error::new(siem_core::ErrorCode::ArchiveWriteFailed, e.to_string())
                .add_trace("HttpObjectStore::put")
        })?;

        if !resp.status().is_success() {
            return Err(Error::new(
                siem_core::ErrorCode::ArchiveWriteFailed,
                format!("archive write to {url} returned {}", resp.status()),
            ));
        }
        Ok(())
    }
}

/// Archives `event` if the predicate is satisfied; failures are logged but
/// never propagated (spec §4.J: "archival is best-effort").
pub async fn archive_if_eligible(
    store: &dyn ObjectStore,
    bucket: &str,
    event: &Event,
    event_id: &str,
    metrics: &Arc<PipelineMetrics>,
) {
    if !should_archive(event) {
        return;
    }

    let key = object_key(event, event_id);
    let body = match serde_json::to_vec(event) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to serialize event for archival");
            return;
        }
    };

    if let Err(e) = store.put(bucket, &key, body).await {
        metrics
            .archive_write_failures_total
            .with_label_values(&[bucket])
            .inc();
        warn!(error = %e, bucket, key, "archive write failed, continuing pipeline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(severity: Severity, event_type: &str) -> Event {
        Event {
            source: "fw-01".to_string(),
            event_type: event_type.to_string(),
            timestamp: Some("2026-01-02T03:04:05Z".parse().unwrap()),
            severity,
            vendor: None,
            data: serde_json::json!({}),
            metadata: Default::default(),
            enriched: None,
        }
    }

    #[test]
    fn critical_severity_is_archived() {
        assert!(should_archive(&event(Severity::Critical, "login")));
    }

    #[test]
    fn info_severity_with_no_keyword_is_not_archived() {
        assert!(!should_archive(&event(Severity::Info, "login")));
    }

    #[test]
    fn event_type_keyword_triggers_archival_regardless_of_severity() {
        assert!(should_archive(&event(Severity::Info, "network_attack")));
    }

    #[test]
    fn object_key_matches_date_source_time_shape() {
        let key = object_key(&event(Severity::Critical, "login"), "evt-1");
        assert_eq!(key, "2026/01/02/fw-01/030405-evt-1.json");
    }
}
