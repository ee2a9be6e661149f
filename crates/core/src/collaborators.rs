//! Collaborator traits for systems explicitly out of scope (spec §1): the
//! durable event log, the search index, cold object storage, and the
//! enrichment data providers. Concrete implementations live in
//! `siem-collector`/`siem-processor`; tests exercise these traits against
//! in-memory fakes.

use crate::error::Result;
use crate::types::{Event, GeoIpInfo, ThreatIntelInfo};
use async_trait::async_trait;
use std::net::IpAddr;

/// A message handed to the event bus producer, already JSON-encoded.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub key: String,
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// A message read back from the bus, carrying its delivery id for ack'ing.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub id: String,
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// Produce/poll/commit over the ordered log the ingestion and processing
/// planes communicate through (spec §4.F/§4.G). Out of scope is the broker
/// itself, not this trait's contract.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn produce(&self, topic: &str, message: BusMessage) -> Result<()>;
    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<BusRecord>>;
    async fn commit(&self, topic: &str, group: &str, ids: &[String]) -> Result<()>;
}

/// Writes enriched, deduplicated events into the search index (spec §4.K).
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn ensure_bootstrap(&self, index_prefix: &str) -> Result<()>;
    async fn write_batch(&self, index_prefix: &str, events: &[Event]) -> Result<()>;
}

/// Writes severity/event-type gated events to cold storage (spec §4.J).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// GeoIP lookups used by the Enricher (spec §4.I).
#[async_trait]
pub trait GeoIpReader: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoIpInfo>>;
}

/// Forward DNS resolution used by the Enricher (spec §4.I).
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Result<Vec<String>>;
}

/// Threat intelligence lookups used by the Enricher (spec §4.I).
#[async_trait]
pub trait ThreatIntelClient: Send + Sync {
    async fn lookup(&self, indicator: &str) -> Result<Option<ThreatIntelInfo>>;
}

/// Case-management ticket creation, one of the playbook action kinds
/// (spec §4.N).
#[async_trait]
pub trait CaseManagementClient: Send + Sync {
    async fn create_case(&self, title: &str, description: &str, severity: &str) -> Result<String>;
}

/// Principal lookup for the auth gatekeeper (spec §4.B).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<crate::types::User>>;
}
