use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized error codes for the ingestion and detection pipeline.
/// Business-agnostic technical categories, grouped by numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General / internal errors (1000-1999)
    InternalError = 1000,
    ConfigurationError = 1001,
    Timeout = 1002,

    // Auth errors (2000-2999)
    Unauthorized = 2000,
    Forbidden = 2001,
    LoginLocked = 2002,
    TokenExpired = 2003,
    TokenInvalid = 2004,

    // Rate limiting (3000-3999)
    RateLimited = 3000,

    // Parse / validation (4000-4999)
    BadRequest = 4000,
    ValidationError = 4001,

    // Event bus (5000-5999)
    EventBusUnavailable = 5000,
    EventBusPublishFailed = 5001,
    ServiceBusy = 5002,

    // Index / archive / enrichment (6000-6999)
    IndexUnavailable = 6000,
    IndexWriteFailed = 6001,
    ArchiveWriteFailed = 6002,
    EnrichmentProviderFailed = 6003,
    SerializationError = 6004,

    // Detection / playbook (7000-7999)
    RuleCompilationError = 7000,
    PlaybookActionFailed = 7001,
    PlaybookActionTimeout = 7002,
}

impl ErrorCode {
    /// HTTP status for this error at the ingestion HTTP boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::SerializationError
            | ErrorCode::RuleCompilationError
            | ErrorCode::PlaybookActionFailed
            | ErrorCode::PlaybookActionTimeout
            | ErrorCode::EnrichmentProviderFailed
            | ErrorCode::ArchiveWriteFailed
            | ErrorCode::IndexWriteFailed => 500,

            ErrorCode::EventBusUnavailable | ErrorCode::IndexUnavailable => 503,
            ErrorCode::ServiceBusy => 503,
            ErrorCode::EventBusPublishFailed => 503,

            ErrorCode::Timeout => 408,

            ErrorCode::Unauthorized | ErrorCode::TokenExpired | ErrorCode::TokenInvalid => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::LoginLocked => 429,
            ErrorCode::RateLimited => 429,

            ErrorCode::BadRequest => 400,
            ErrorCode::ValidationError => 422,
        }
    }

    /// Category name used for metrics and logging.
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InternalError | ErrorCode::ConfigurationError | ErrorCode::Timeout => {
                "system"
            }
            ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::LoginLocked
            | ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid => "security",

            ErrorCode::RateLimited => "rate_limit",

            ErrorCode::BadRequest | ErrorCode::ValidationError => "validation",

            ErrorCode::EventBusUnavailable
            | ErrorCode::EventBusPublishFailed
            | ErrorCode::ServiceBusy => "event_bus",

            ErrorCode::IndexUnavailable
            | ErrorCode::IndexWriteFailed
            | ErrorCode::ArchiveWriteFailed
            | ErrorCode::EnrichmentProviderFailed
            | ErrorCode::SerializationError => "storage",

            ErrorCode::RuleCompilationError
            | ErrorCode::PlaybookActionFailed
            | ErrorCode::PlaybookActionTimeout => "detection",
        }
    }

    /// Whether the originating operation is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::EventBusUnavailable
                | ErrorCode::EventBusPublishFailed
                | ErrorCode::IndexUnavailable
                | ErrorCode::Timeout
        )
    }

    /// Whether this error should be logged at `error` level rather than `warn`/`info`.
    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::BadRequest
                | ErrorCode::ValidationError
                | ErrorCode::Unauthorized
                | ErrorCode::Forbidden
                | ErrorCode::LoginLocked
                | ErrorCode::RateLimited
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
