//! Shared rate-limit counter store (spec §4.C).
//!
//! The prototype's collector used `redis_client.incr` followed by a
//! conditional `expire` when the key had no TTL yet:
//!
//! ```python
//! current_count = redis_client.incr(rate_limit_key)
//! if redis_client.ttl(rate_limit_key) == -1:
//!     redis_client.expire(rate_limit_key, 60)
//! ```
//!
//! `RedisRateLimitStore` reproduces that exact sequence over
//! `ConnectionManager` rather than switching to a `SET ... EX` compare-and-swap,
//! so observed counts match the original semantics under concurrent access.

use crate::error::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Outcome of a rate-limit check for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: i64,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increments the counter for `key`, setting a `window_seconds` TTL the
    /// first time the key is created, and reports whether `limit` was
    /// exceeded (spec §4.C).
    async fn check(&self, key: &str, limit: u32, window_seconds: i64) -> Result<RateLimitDecision>;
}

#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
}

impl RedisRateLimitStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn check(&self, key: &str, limit: u32, window_seconds: i64) -> Result<RateLimitDecision> {
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(key, 1).await?;

        let ttl: i64 = conn.ttl(key).await?;
        if ttl == -1 {
            let _: () = conn.expire(key, window_seconds).await?;
        }

        let reset_seconds = if ttl == -1 { window_seconds } else { ttl.max(0) };
        let allowed = count <= limit as u64;
        let remaining = (limit as u64).saturating_sub(count) as u32;

        Ok(RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_reports_exhausted_budget() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_seconds: 42,
        };
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
