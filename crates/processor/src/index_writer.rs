//! Template/lifecycle/rollover-aware search-index writer (spec §4.K).
//!
//! Out of scope per spec §1 is the index engine itself; `IndexWriter` is
//! implemented here against a JSON-over-HTTP index engine (the wire protocol
//! assumed by `spec.md` §4.K's template/ILM/rollover vocabulary) via
//! `reqwest`, matching the prototype's `elasticsearch.py` bootstrap sequence
//! and timing numbers exactly.

use async_trait::async_trait;
use chrono::Utc;
use siem_core::{Error, ErrorCode, Event, IndexWriter, Result};
use tracing::{info, warn};

pub struct HttpIndexWriter {
    client: reqwest::Client,
    hosts: Vec<String>,
    username: Option<String>,
    password: Option<String>,
}

impl HttpIndexWriter {
    pub fn new(hosts: Vec<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            hosts,
            username,
            password,
        }
    }

    fn host(&self) -> Result<&str> {
        self.hosts
            .first()
            .map(|s| s.as_str())
            .ok_or_else(|| Error::new(ErrorCode::IndexUnavailable, "no index hosts configured"))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}/{}", self.host()?.trim_end_matches('/'), path);
        let mut req = self.client.request(method, url);
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            req = req.basic_auth(user, Some(pass));
        }
        Ok(req)
    }

    /// Index template matching `logs-*` with a rollover alias `logs-write`
    /// (spec §4.K).
    fn index_template(index_prefix: &str) -> serde_json::Value {
        serde_json::json!({
            "index_patterns": [format!("{index_prefix}-*")],
            "template": {
                "settings": { "index.lifecycle.name": format!("{index_prefix}-policy"),
                              "index.lifecycle.rollover_alias": format!("{index_prefix}-write") },
                "mappings": {
                    "properties": {
                        "timestamp": { "type": "date" },
                        "source": { "type": "keyword" },
                        "event_type": { "type": "keyword" },
                        "vendor": { "type": "keyword" },
                        "data": { "type": "object", "dynamic": true },
                        "enriched": {
                            "properties": {
                                "processing_timestamp": { "type": "date" },
                                "ip_info": { "type": "object", "dynamic": true },
                                "threat_intel": { "type": "object", "dynamic": true },
                                "dns_info": { "type": "object", "dynamic": true }
                            }
                        }
                    }
                }
            }
        })
    }

    /// hot (rollover at 30d/50GiB) → warm (+30d shrink+force-merge) →
    /// cold (+90d) → delete (+365d) — matches spec §4.K and the prototype's
    /// `elasticsearch.py` verbatim.
    fn lifecycle_policy() -> serde_json::Value {
        serde_json::json!({
            "policy": {
                "phases": {
                    "hot": {
                        "actions": {
                            "rollover": { "max_age": "30d", "max_size": "50gb" }
                        }
                    },
                    "warm": {
                        "min_age": "30d",
                        "actions": {
                            "shrink": { "number_of_shards": 1 },
                            "forcemerge": { "max_num_segments": 1 }
                        }
                    },
                    "cold": { "min_age": "90d", "actions": {} },
                    "delete": { "min_age": "365d", "actions": { "delete": {} } }
                }
            }
        })
    }
}

#[async_trait]
impl IndexWriter for HttpIndexWriter {
    async fn ensure_bootstrap(&self, index_prefix: &str) -> Result<()> {
        let policy_name = format!("{index_prefix}-policy");
        self.request(reqwest::Method::PUT, &format!("_ilm/policy/{policy_name}"))?
            .json(&Self::lifecycle_policy())
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::IndexUnavailable, e.to_string()))?;

        let template_name = format!("{index_prefix}-template");
        self.request(
            reqwest::Method::PUT,
            &format!("_index_template/{template_name}"),
        )?
        .json(&Self::index_template(index_prefix))
        .send()
        .await
        .map_err(|e| Error::new(ErrorCode::IndexUnavailable, e.to_string()))?;

        let write_alias = format!("{index_prefix}-write");
        let current_index = format!("{}-{}", index_prefix, Utc::now().format("%Y.%m"));

        let alias_resp = self
            .request(reqwest::Method::HEAD, &write_alias)?
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::IndexUnavailable, e.to_string()))?;

        if !alias_resp.status().is_success() {
            info!(index = %current_index, "write alias missing, bootstrapping first index");
            self.request(reqwest::Method::PUT, &current_index)?
                .json(&serde_json::json!({ "aliases": { write_alias.clone(): { "is_write_index": true } } }))
                .send()
                .await
                .map_err(|e| Error::new(ErrorCode::IndexUnavailable, e.to_string()))?;
        } else {
            let current_exists = self
                .request(reqwest::Method::HEAD, &current_index)?
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false);
            if !current_exists {
                warn!(index = %current_index, "current month's index missing under existing alias, triggering rollover");
                self.request(
                    reqwest::Method::POST,
                    &format!("{write_alias}/_rollover"),
                )?
                .send()
                .await
                .map_err(|e| Error::new(ErrorCode::IndexUnavailable, e.to_string()))?;
            }
        }

        Ok(())
    }

    async fn write_batch(&self, index_prefix: &str, events: &[Event]) -> Result<()> {
        let write_alias = format!("{index_prefix}-write");
        let mut body = String::new();
        for event in events {
            let doc_id = siem_core::fingerprint(event);
            body.push_str(&format!(
                "{{\"index\":{{\"_index\":\"{write_alias}\",\"_id\":\"{doc_id}\"}}}}\n"
            ));
            body.push_str(&serde_json::to_string(event).map_err(Error::from)?);
            body.push('\n');
        }

        let resp = self
            .request(reqwest::Method::POST, "_bulk")?
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::new(ErrorCode::IndexWriteFailed, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::new(
                ErrorCode::IndexWriteFailed,
                format!("bulk write returned {}", resp.status()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_template_targets_the_configured_prefix() {
        let template = HttpIndexWriter::index_template("logs");
        assert_eq!(
            template["index_patterns"][0],
            serde_json::json!("logs-*")
        );
    }

    #[test]
    fn lifecycle_policy_matches_spec_timings() {
        let policy = HttpIndexWriter::lifecycle_policy();
        let phases = &policy["policy"]["phases"];
        assert_eq!(phases["hot"]["actions"]["rollover"]["max_age"], "30d");
        assert_eq!(phases["warm"]["min_age"], "30d");
        assert_eq!(phases["cold"]["min_age"], "90d");
        assert_eq!(phases["delete"]["min_age"], "365d");
    }
}
