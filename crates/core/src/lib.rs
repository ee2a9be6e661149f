pub mod collaborators;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod metrics;
pub mod playbook;
pub mod rate_limit;
pub mod rules;
pub mod security;
pub mod types;
pub mod utils;

pub use collaborators::{
    BusMessage, BusRecord, CaseManagementClient, DnsResolver, EventBus, GeoIpReader, IndexWriter,
    ObjectStore, ThreatIntelClient, UserStore,
};
pub use config::Config;
pub use error::{Error, ErrorCode, ErrorContext, ErrorMetrics, Result};
pub use fingerprint::fingerprint;
pub use metrics::{MetricsRegistry, MetricsService, PipelineMetrics};
pub use playbook::{ActionType, Playbook, PlaybookAction};
pub use rate_limit::{RateLimitDecision, RateLimitStore, RedisRateLimitStore};
pub use rules::{CombineOp, ConditionClause, ConditionOp, ConditionRule, Detection, Rule};
pub use security::{PasswordHasher, TokenService};
pub use types::*;

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
