//! HTTP-facing wrapper around `siem_core::Error` (spec §7).
//!
//! Sanitizes responses in production, keeps full detail in development, and
//! logs at a level derived from the resulting HTTP status — grounded on the
//! donor's `erp-api::error::ApiError`.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use siem_core::{Error, ErrorCode};
use std::env;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct ApiError {
    error: Error,
    environment: String,
}

impl ApiError {
    pub fn new(error: Error) -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self { error, environment }
    }

    fn log(&self) {
        let status = self.error.http_status();
        match status {
            500..=599 => error!(
                error_code = %self.error.code,
                error_id = %self.error.context.error_id,
                request_id = ?self.error.context.request_id,
                "ingestion request failed: {}",
                self.error
            ),
            400..=499 if self.error.should_log_as_error() => warn!(
                error_code = %self.error.code,
                request_id = ?self.error.context.request_id,
                "ingestion request rejected: {}",
                self.error
            ),
            _ => debug!(
                error_code = %self.error.code,
                request_id = ?self.error.context.request_id,
                "ingestion request rejected: {}",
                self.error
            ),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let rate_limit_headers = rate_limit_headers(&self.error);
        let body = self
            .error
            .to_api_response_with_environment(&self.environment);
        let mut response = (status, Json(body)).into_response();
        for (name, value) in rate_limit_headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}

/// `X-RateLimit-*` headers for a rejected request (spec §4.C, §6). Only
/// populated when the rejecting dimension attached them as metadata.
fn rate_limit_headers(error: &Error) -> Vec<(HeaderName, HeaderValue)> {
    if error.code != ErrorCode::RateLimited {
        return Vec::new();
    }
    let mut headers = Vec::new();
    if let Some(limit) = error.context.metadata.get("rate_limit_limit").and_then(|v| v.as_u64()) {
        headers.push((
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from_str(&limit.to_string()).unwrap(),
        ));
    }
    if let Some(remaining) = error
        .context
        .metadata
        .get("rate_limit_remaining")
        .and_then(|v| v.as_u64())
    {
        headers.push((
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from_str(&remaining.to_string()).unwrap(),
        ));
    }
    if let Some(reset) = error.context.metadata.get("rate_limit_reset").and_then(|v| v.as_i64()) {
        headers.push((
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from_str(&reset.to_string()).unwrap(),
        ));
    }
    headers
}

pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "message": "resource not found" } })),
    )
        .into_response()
}
