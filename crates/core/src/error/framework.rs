use super::{ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    System,
    Security,
    RateLimit,
    Validation,
    EventBus,
    Storage,
    Detection,
}

/// The pipeline's single error currency. Every crate boundary converts
/// foreign errors into this type via `From`.
#[derive(Debug, ThisError, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    pub context: ErrorContext,
    pub severity: ErrorSeverity,
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.add_metadata(key.into(), value);
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code.category() {
            "system" => ErrorCategory::System,
            "security" => ErrorCategory::Security,
            "rate_limit" => ErrorCategory::RateLimit,
            "validation" => ErrorCategory::Validation,
            "event_bus" => ErrorCategory::EventBus,
            "storage" => ErrorCategory::Storage,
            "detection" => ErrorCategory::Detection,
            _ => ErrorCategory::System,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error()
            || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    /// Convert to JSON for API responses (sanitized for security)
    pub fn to_api_response(&self) -> serde_json::Value {
        self.to_api_response_with_environment("development")
    }

    pub fn to_api_response_with_environment(&self, environment: &str) -> serde_json::Value {
        let is_production = environment == "production";

        let (message, details) = if is_production {
            self.sanitize_for_production()
        } else {
            (self.message.clone(), self.details.clone())
        };

        serde_json::json!({
            "error": {
                "code": self.code,
                "message": message,
                "details": if is_production { None } else { details },
                "error_id": self.context.error_id,
                "request_id": self.context.request_id,
                "timestamp": self.context.timestamp
            }
        })
    }

    /// Full debug JSON for internal logging only, never for API responses.
    pub fn to_debug_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "context": self.context,
                "severity": self.severity,
                "cause": self.cause.as_ref().map(|c| c.to_debug_json())
            }
        })
    }

    fn sanitize_for_production(&self) -> (String, Option<String>) {
        let sanitized_message = match self.code {
            ErrorCode::Unauthorized | ErrorCode::TokenExpired | ErrorCode::TokenInvalid => {
                "Authentication failed".to_string()
            }
            ErrorCode::Forbidden => "Access denied".to_string(),
            ErrorCode::LoginLocked => {
                "Too many failed attempts, account temporarily locked".to_string()
            }
            ErrorCode::ValidationError => "Input validation failed".to_string(),
            ErrorCode::BadRequest => "Malformed request".to_string(),
            ErrorCode::RateLimited => "Rate limit exceeded, please try again later".to_string(),
            ErrorCode::ServiceBusy => "Service is busy, please try again later".to_string(),
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::Timeout
            | ErrorCode::EventBusUnavailable
            | ErrorCode::EventBusPublishFailed
            | ErrorCode::IndexUnavailable
            | ErrorCode::IndexWriteFailed
            | ErrorCode::ArchiveWriteFailed
            | ErrorCode::EnrichmentProviderFailed
            | ErrorCode::SerializationError
            | ErrorCode::RuleCompilationError
            | ErrorCode::PlaybookActionFailed
            | ErrorCode::PlaybookActionTimeout => {
                "An internal error occurred. Please try again later".to_string()
            }
        };

        (sanitized_message, None)
    }

    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::BadRequest | ErrorCode::ValidationError => ErrorSeverity::Low,

            ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid
            | ErrorCode::RateLimited
            | ErrorCode::EnrichmentProviderFailed
            | ErrorCode::ArchiveWriteFailed => ErrorSeverity::Medium,

            ErrorCode::LoginLocked
            | ErrorCode::EventBusUnavailable
            | ErrorCode::IndexUnavailable
            | ErrorCode::ServiceBusy
            | ErrorCode::PlaybookActionFailed
            | ErrorCode::PlaybookActionTimeout => ErrorSeverity::High,

            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::EventBusPublishFailed
            | ErrorCode::IndexWriteFailed
            | ErrorCode::RuleCompilationError
            | ErrorCode::SerializationError
            | ErrorCode::Timeout => ErrorSeverity::Critical,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        let error_ser = ErrorSer {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        };

        error_ser.serialize(serializer)
    }
}

// Convenience constructors matching the pipeline's error taxonomy (spec §7).
impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn login_locked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LoginLocked, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn service_busy(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceBusy, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EventBusUnavailable, message)
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let code = match err.kind() {
            redis::ErrorKind::IoError => ErrorCode::EventBusUnavailable,
            redis::ErrorKind::TypeError | redis::ErrorKind::ExecAbortError => {
                ErrorCode::SerializationError
            }
            _ => ErrorCode::EventBusUnavailable,
        };

        Self::new(code, err.to_string()).add_trace("redis::RedisError conversion")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        let code = if err.is_data() || err.is_syntax() {
            ErrorCode::BadRequest
        } else {
            ErrorCode::SerializationError
        };

        Self::new(code, err.to_string()).add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        let code = match err.kind() {
            ErrorKind::ExpiredSignature => ErrorCode::TokenExpired,
            _ => ErrorCode::TokenInvalid,
        };
        Self::new(code, err.to_string()).add_trace("jsonwebtoken::errors::Error conversion")
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::new(ErrorCode::EnrichmentProviderFailed, err.to_string())
            .add_trace("reqwest::Error conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_sanitization_hides_details() {
        let err = Error::validation("field 'event_type' missing").with_details("raw body: {}");
        let resp = err.to_api_response_with_environment("production");
        assert_eq!(resp["error"]["details"], serde_json::Value::Null);
        assert_eq!(resp["error"]["message"], "Input validation failed");
    }

    #[test]
    fn development_preserves_details() {
        let err = Error::validation("bad input").with_details("field X");
        let resp = err.to_api_response_with_environment("development");
        assert_eq!(resp["error"]["details"], "field X");
    }

    #[test]
    fn http_status_matches_taxonomy() {
        assert_eq!(Error::rate_limited("x").http_status(), 429);
        assert_eq!(Error::login_locked("x").http_status(), 429);
        assert_eq!(Error::forbidden("x").http_status(), 403);
        assert_eq!(Error::service_busy("x").http_status(), 503);
    }
}
