//! Request ID / client-context middleware (spec §10.1).
//!
//! Extracts or generates a request id, pulls the client IP and user agent
//! out of proxy headers, and stashes a `RequestContext` in the request
//! extensions for handlers and the error path to pick up. Adapted from the
//! donor's `erp-api::api_middleware::request_id` — header precedence and IP
//! extraction logic kept verbatim.

use axum::{
    extract::Request,
    http::{header::HeaderValue, HeaderName, StatusCode},
    middleware::Next,
    response::Response,
};
use siem_core::RequestContext;
use std::str::FromStr;
use tracing::{debug, Span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let request_id = extract_or_generate_request_id(&request);

    let context = enrich_request_context(
        RequestContext::new().with_request_id(request_id.clone()),
        &request,
    );
    request.extensions_mut().insert(context);

    let span = Span::current();
    span.record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_str(REQUEST_ID_HEADER).unwrap(), header_value);
    }

    debug!(request_id = %request_id, status = %response.status(), "request completed");
    Ok(response)
}

fn extract_or_generate_request_id(request: &Request) -> String {
    let candidates = [
        REQUEST_ID_HEADER,
        "x-correlation-id",
        "x-trace-id",
        "request-id",
    ];

    for header_name in candidates {
        if let Some(value) = request.headers().get(header_name) {
            if let Ok(id_str) = value.to_str() {
                if is_valid_request_id(id_str) {
                    return id_str.to_string();
                }
            }
        }
    }

    Uuid::new_v4().to_string()
}

fn enrich_request_context(mut context: RequestContext, request: &Request) -> RequestContext {
    if let Some(ip) = extract_client_ip(request) {
        context = context.with_source_ip(ip);
    }

    if let Some(user_agent) = request.headers().get("user-agent") {
        if let Ok(ua_str) = user_agent.to_str() {
            context = context.with_user_agent(ua_str);
        }
    }

    if let Some(correlation_id) = request.headers().get("x-correlation-id") {
        if let Ok(corr_str) = correlation_id.to_str() {
            context = context.with_correlation_id(corr_str);
        }
    }

    context
}

fn extract_client_ip(request: &Request) -> Option<String> {
    let headers = [
        "x-forwarded-for",
        "x-real-ip",
        "cf-connecting-ip",
        "x-client-ip",
        "x-forwarded",
        "forwarded-for",
        "forwarded",
    ];

    for header_name in headers {
        if let Some(value) = request.headers().get(header_name) {
            if let Ok(ip_str) = value.to_str() {
                let ip = if header_name == "x-forwarded-for" {
                    ip_str.split(',').next().unwrap_or(ip_str).trim()
                } else {
                    ip_str.trim()
                };
                if is_valid_ip(ip) {
                    return Some(ip.to_string());
                }
            }
        }
    }

    None
}

fn is_valid_request_id(id: &str) -> bool {
    if Uuid::from_str(id).is_ok() {
        return true;
    }
    id.len() >= 8 && id.len() <= 128 && id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<std::net::IpAddr>().is_ok()
}

/// Extension trait mirroring the donor's `RequestIdExt`.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
    fn request_context(&self) -> Option<&RequestContext>;
    fn source_ip(&self) -> Option<&str>;
}

impl RequestIdExt for Request {
    fn request_id(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id.as_str())
    }

    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }

    fn source_ip(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestContext>()
            .and_then(|ctx| ctx.source_ip.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn generates_request_id_when_absent() {
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(is_valid_request_id(id.to_str().unwrap()));
    }

    #[test]
    fn client_ip_takes_first_forwarded_entry() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.1, 70.41.3.18")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&request), Some("203.0.113.1".to_string()));
    }
}
