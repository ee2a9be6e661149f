//! Bearer-token auth gate for the ingestion endpoints (spec §4.B/§4.E).
//!
//! Verifies the `Authorization: Bearer <token>` header against the
//! configured `TokenService`, binding to the caller's IP when the token
//! carries one, and folds the resulting username/scopes into the
//! `RequestContext` the request-id middleware already stashed in the
//! request extensions. Scope enforcement (`logs:write`) is a separate
//! layer, mirroring the donor's `auth_middleware` / `require_permission`
//! split in `erp-auth::middleware`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use siem_core::{Error, RequestContext, Scope};

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;

    let existing = request.extensions().get::<RequestContext>().cloned();
    let client_ip = existing.as_ref().and_then(|ctx| ctx.source_ip.clone());

    let claims = state.tokens.verify(&token, client_ip.as_deref())?;

    let context = existing
        .unwrap_or_default()
        .with_principal(claims.sub, claims.scopes);
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Builds a scope-gating middleware fn, mirroring the donor's
/// `require_permission` closure factory.
pub fn require_scope(
    scope: Scope,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, ApiError>> + Send>>
       + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let has_scope = request
                .extensions()
                .get::<RequestContext>()
                .map(|ctx| ctx.has_scope(scope))
                .unwrap_or(false);

            if !has_scope {
                return Err(Error::forbidden(format!("missing required scope '{scope}'")).into());
            }

            Ok(next.run(request).await)
        })
    }
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}
