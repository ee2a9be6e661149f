//! `POST /token` — the auth gatekeeper (spec §4.B).
//!
//! Ported from the prototype's `auth.py` lockout flow: failed attempts are
//! tracked per username in Redis under `failed_login:<username>`, counted
//! against `max_failed_login_attempts`, and locked out for
//! `lockout_duration_minutes` once exceeded. A successful login clears the
//! counter. The issued token optionally binds to the requesting client IP
//! (spec §4.B's IP-binding note).

use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use crate::error::ApiError;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use siem_core::Error;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/token", post(issue_token))
}

async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TokenRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let lockout_key = format!("failed_login:{}", payload.username);
    let mut conn = state.redis.clone();

    let attempts: u32 = conn.get(&lockout_key).await.unwrap_or(0);
    if attempts >= state.config.auth.max_failed_login_attempts {
        state
            .metrics
            .account_lockouts_total
            .with_label_values(&[&payload.username])
            .inc();
        return Err(Error::login_locked(format!(
            "account '{}' is locked; retry in up to {} minutes",
            payload.username, state.config.auth.lockout_duration_minutes
        ))
        .into());
    }

    let user = state.users.find_user(&payload.username).await?;
    let verified = match &user {
        Some(user) if !user.disabled => state
            .passwords
            .verify_password(&payload.password, &user.password_hash)
            .unwrap_or(false),
        _ => false,
    };

    if !verified {
        let count: u32 = conn.incr(&lockout_key, 1u32).await.unwrap_or(0);
        let ttl: i64 = conn.ttl(&lockout_key).await.unwrap_or(-1);
        if ttl == -1 {
            let _: std::result::Result<(), _> = conn
                .expire(&lockout_key, state.config.auth.lockout_duration_minutes * 60)
                .await;
        }
        state
            .metrics
            .login_failures_total
            .with_label_values(&["bad_credentials"])
            .inc();
        state
            .metrics
            .login_attempts_total
            .with_label_values(&["failure"])
            .inc();

        if count > state.config.auth.max_failed_login_attempts {
            return Err(Error::login_locked(format!(
                "account '{}' is now locked after {} failed attempts",
                payload.username, count
            ))
            .into());
        }
        return Err(Error::unauthorized("invalid username or password").into());
    }

    let _: std::result::Result<(), _> = conn.del(&lockout_key).await;

    let user = user.expect("verified implies a matching user record");
    let client_ip = client_ip_from_headers(&headers);

    let access_token = state.tokens.issue(&user.username, user.scopes.clone(), client_ip)?;

    state
        .metrics
        .login_attempts_total
        .with_label_values(&["success"])
        .inc();

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.tokens.access_token_expiry_seconds(),
    }))
}

fn client_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
}
