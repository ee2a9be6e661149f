//! Access-token issuance and verification (spec §4.B).
//!
//! The pipeline issues a single token kind — unlike the donor's
//! access+refresh pair — since the spec names no refresh-token workflow.

use crate::error::ErrorCode;
use crate::types::{AccessTokenClaims, Scope};
use crate::{Error, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use uuid::Uuid;

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_token_expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry: Duration::minutes(access_token_expiry_minutes),
        }
    }

    /// Generates a random per-process signing secret when none is
    /// configured, surfacing the warning required by spec §4.B/§9 — tokens
    /// issued this way do not survive a restart.
    pub fn generate_ephemeral_secret() -> String {
        tracing::warn!(
            "no JWT_SECRET_KEY configured; generating an ephemeral per-process signing key. \
             tokens issued now will not validate after a restart."
        );
        let bytes: [u8; 32] = rand::thread_rng().gen();
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
    }

    pub fn issue(
        &self,
        username: &str,
        scopes: Vec<Scope>,
        client_ip: Option<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: username.to_string(),
            scopes,
            iat: now.timestamp(),
            exp: (now + self.access_token_expiry).timestamp(),
            jti: Uuid::new_v4().to_string(),
            client_ip,
        };

        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)
            .map_err(|e| Error::new(ErrorCode::TokenInvalid, format!("failed to issue token: {e}")))
    }

    /// Verifies signature and expiry. If `client_ip` is supplied and the
    /// token carries an IP binding, a mismatch fails verification too
    /// (spec §4.B).
    pub fn verify(&self, token: &str, client_ip: Option<&str>) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = true;

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        let claims = data.claims;

        if let (Some(bound_ip), Some(request_ip)) = (&claims.client_ip, client_ip) {
            if bound_ip != request_ip {
                return Err(Error::unauthorized("client IP does not match token binding"));
            }
        }

        Ok(claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let svc = TokenService::new("a-sufficiently-long-test-secret-key-value", 30);
        let token = svc
            .issue("alice", vec![Scope::LogsWrite], Some("10.0.0.1".to_string()))
            .unwrap();

        let claims = svc.verify(&token, Some("10.0.0.1")).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.scopes.contains(&Scope::LogsWrite));
    }

    #[test]
    fn ip_mismatch_is_rejected() {
        let svc = TokenService::new("a-sufficiently-long-test-secret-key-value", 30);
        let token = svc
            .issue("alice", vec![Scope::LogsWrite], Some("10.0.0.1".to_string()))
            .unwrap();

        assert!(svc.verify(&token, Some("10.0.0.2")).is_err());
    }
}
