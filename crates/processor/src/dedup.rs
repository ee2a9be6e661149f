//! Content-fingerprint deduplicator (spec §4.H): a bounded short-window
//! suppression cache, not a correctness mechanism — duplicates that arrive
//! in different sweep windows are re-emitted.

use dashmap::DashSet;
use siem_core::{fingerprint, Event};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Thread-safe fingerprint cache with full-sweep eviction.
#[derive(Clone)]
pub struct Deduplicator {
    seen: Arc<DashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(DashSet::new()),
        }
    }

    /// Returns `true` iff `event`'s fingerprint is already present, inserting
    /// it as a side effect when absent.
    pub fn is_duplicate(&self, event: &Event) -> bool {
        let fp = fingerprint(event);
        !self.seen.insert(fp)
    }

    /// Clears the whole cache in bulk (spec §4.H: "every `cache_cleanup_interval`
    /// the set is cleared in bulk").
    pub fn sweep(&self) {
        let cleared = self.seen.len();
        self.seen.clear();
        info!(cleared, "dedup cache swept");
    }

    /// Spawns the periodic sweep task; the returned handle is dropped by the
    /// caller on shutdown.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let dedup = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                dedup.sweep();
            }
        })
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(data: serde_json::Value) -> Event {
        Event {
            source: "test-system".to_string(),
            event_type: "login".to_string(),
            timestamp: None,
            severity: Default::default(),
            vendor: None,
            data,
            metadata: Default::default(),
            enriched: None,
        }
    }

    #[test]
    fn second_identical_event_is_a_duplicate() {
        let dedup = Deduplicator::new();
        let e = event(json!({"user": "u", "ip": "10.0.0.1"}));
        assert!(!dedup.is_duplicate(&e));
        assert!(dedup.is_duplicate(&e));
    }

    #[test]
    fn sweep_clears_the_cache() {
        let dedup = Deduplicator::new();
        let e = event(json!({"user": "u"}));
        assert!(!dedup.is_duplicate(&e));
        dedup.sweep();
        assert!(!dedup.is_duplicate(&e));
    }

    #[test]
    fn differing_data_is_not_a_duplicate() {
        let dedup = Deduplicator::new();
        let a = event(json!({"user": "a"}));
        let b = event(json!({"user": "b"}));
        assert!(!dedup.is_duplicate(&a));
        assert!(!dedup.is_duplicate(&b));
    }
}
