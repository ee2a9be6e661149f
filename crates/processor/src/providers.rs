//! Concrete enrichment collaborators (spec §4.I) wired into `main.rs`.
//!
//! DNS resolution uses `tokio::net::lookup_host`, already pulled in by the
//! runtime — no extra resolver crate needed. Threat intel is a `reqwest` GET
//! against each configured provider in turn, first hit wins. GeoIP has no
//! binding crate in this workspace's dependency stack (no MaxMind reader is
//! used anywhere in the corpus this was built from), so it is a documented
//! no-op until one is added; the Enricher treats a `None` geoip result the
//! same as a provider miss.

use async_trait::async_trait;
use siem_core::config::ThreatIntelProviderConfig;
use siem_core::{DnsResolver, Error, ErrorCode, GeoIpInfo, GeoIpReader, Result, ThreatIntelClient, ThreatIntelInfo};
use std::net::IpAddr;
use tracing::warn;

pub struct NullGeoIpReader;

#[async_trait]
impl GeoIpReader for NullGeoIpReader {
    async fn lookup(&self, _ip: IpAddr) -> Result<Option<GeoIpInfo>> {
        Ok(None)
    }
}

pub struct TokioDnsResolver;

#[async_trait]
impl DnsResolver for TokioDnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<String>> {
        let addrs = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| Error::new(ErrorCode::InternalError, format!("dns lookup failed for {hostname}: {e}")))?;
        Ok(addrs.map(|addr| addr.ip().to_string()).collect())
    }
}

pub struct HttpThreatIntelClient {
    client: reqwest::Client,
    providers: Vec<ThreatIntelProviderConfig>,
}

impl HttpThreatIntelClient {
    pub fn new(providers: Vec<ThreatIntelProviderConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            providers,
        }
    }
}

#[async_trait]
impl ThreatIntelClient for HttpThreatIntelClient {
    async fn lookup(&self, indicator: &str) -> Result<Option<ThreatIntelInfo>> {
        for provider in &self.providers {
            let url = format!("{}/{}", provider.base_url.trim_end_matches('/'), indicator);
            let mut req = self.client.get(&url);
            if let Some(key) = &provider.api_key {
                req = req.bearer_auth(key);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, "threat intel provider unreachable");
                    continue;
                }
            };

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !resp.status().is_success() {
                warn!(provider = %provider.name, status = %resp.status(), "threat intel provider returned an error");
                continue;
            }

            match resp.json::<ThreatIntelInfo>().await {
                Ok(info) => return Ok(Some(info)),
                Err(e) => warn!(provider = %provider.name, error = %e, "malformed threat intel response"),
            }
        }
        Ok(None)
    }
}
