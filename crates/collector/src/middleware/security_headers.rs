//! Security response headers (spec §10.1 ambient stack), ported verbatim
//! from the donor's `erp-api::api_middleware::security_headers`.

use axum::{extract::Request, http::header, http::HeaderValue, middleware::Next, response::Response};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    pub enable_hsts: bool,
    pub hsts_max_age: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
    pub csp: Option<String>,
    pub x_frame_options: Option<String>,
    pub x_content_type_options: bool,
    pub referrer_policy: Option<String>,
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enable_hsts: true,
            hsts_max_age: 31536000,
            hsts_include_subdomains: true,
            hsts_preload: true,
            csp: Some(
                "default-src 'self'; script-src 'self'; style-src 'self'; frame-ancestors 'none'; base-uri 'self'"
                    .to_string(),
            ),
            x_frame_options: Some("DENY".to_string()),
            x_content_type_options: true,
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            permissions_policy: Some(
                "accelerometer=(), camera=(), geolocation=(), gyroscope=(), microphone=(), payment=(), usb=()"
                    .to_string(),
            ),
        }
    }
}

impl SecurityHeadersConfig {
    pub fn development() -> Self {
        Self {
            enable_hsts: false,
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self::default()
    }

    pub fn for_environment(environment: &str) -> Self {
        if environment == "production" {
            Self::production()
        } else {
            Self::development()
        }
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    apply_security_headers(SecurityHeadersConfig::for_environment(&environment), request, next).await
}

async fn apply_security_headers(config: SecurityHeadersConfig, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    if config.enable_hsts {
        let mut hsts_value = format!("max-age={}", config.hsts_max_age);
        if config.hsts_include_subdomains {
            hsts_value.push_str("; includeSubDomains");
        }
        if config.hsts_preload {
            hsts_value.push_str("; preload");
        }
        if let Ok(header_value) = HeaderValue::from_str(&hsts_value) {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, header_value);
        }
    }

    if let Some(csp) = &config.csp {
        if let Ok(header_value) = HeaderValue::from_str(csp) {
            headers.insert(header::CONTENT_SECURITY_POLICY, header_value);
        }
    }

    if let Some(x_frame_options) = &config.x_frame_options {
        if let Ok(header_value) = HeaderValue::from_str(x_frame_options) {
            headers.insert(header::X_FRAME_OPTIONS, header_value);
        }
    }

    if config.x_content_type_options {
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    }

    if let Some(referrer_policy) = &config.referrer_policy {
        if let Ok(header_value) = HeaderValue::from_str(referrer_policy) {
            headers.insert(header::REFERRER_POLICY, header_value);
        }
    }

    if let Some(permissions_policy) = &config.permissions_policy {
        if let Ok(header_value) = HeaderValue::from_str(permissions_policy) {
            headers.insert("Permissions-Policy", header_value);
        }
    }

    headers.remove(header::SERVER);
    debug!("added security headers to response");
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_enables_hsts_and_development_does_not() {
        assert!(SecurityHeadersConfig::production().enable_hsts);
        assert!(!SecurityHeadersConfig::development().enable_hsts);
    }
}
