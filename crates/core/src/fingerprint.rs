//! Event fingerprinting for deduplication (spec §3, §4.J).
//!
//! Mirrors the prototype's `_calculate_fingerprint`: hash `{source,
//! event_type, data}` with `timestamp`/`id`/`sequence_num` stripped out of
//! `data`, serialized with sorted keys so field order never changes the
//! digest.

use crate::types::Event;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const STRIPPED_DATA_FIELDS: [&str; 3] = ["timestamp", "id", "sequence_num"];

/// Computes the deduplication fingerprint for `event` as a lowercase hex
/// SHA-256 digest.
pub fn fingerprint(event: &Event) -> String {
    let data = match &event.data {
        Value::Object(map) => {
            let mut filtered = Map::new();
            for (k, v) in map {
                if !STRIPPED_DATA_FIELDS.contains(&k.as_str()) {
                    filtered.insert(k.clone(), v.clone());
                }
            }
            Value::Object(filtered)
        }
        other => other.clone(),
    };

    let relevant = serde_json::json!({
        "source": event.source,
        "event_type": event.event_type,
        "data": sort_value(&data),
    });

    let canonical =
        serde_json::to_vec(&relevant).expect("fingerprint payload is always serializable");

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Recursively sorts object keys so `serde_json`'s insertion-order `Map`
/// produces a canonical byte sequence regardless of the event's original
/// field order.
fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, Value> = std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), sort_value(v));
            }
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_data(data: Value) -> Event {
        Event {
            source: "firewall".to_string(),
            event_type: "connection".to_string(),
            timestamp: None,
            severity: Default::default(),
            vendor: None,
            data,
            metadata: Default::default(),
            enriched: None,
        }
    }

    #[test]
    fn field_order_does_not_change_fingerprint() {
        let a = event_with_data(serde_json::json!({"src": "1.1.1.1", "dst": "2.2.2.2"}));
        let b = event_with_data(serde_json::json!({"dst": "2.2.2.2", "src": "1.1.1.1"}));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn stripped_fields_do_not_affect_fingerprint() {
        let a = event_with_data(serde_json::json!({"src": "1.1.1.1", "id": "abc"}));
        let b = event_with_data(serde_json::json!({"src": "1.1.1.1", "id": "xyz", "sequence_num": 7}));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_data_yields_different_fingerprint() {
        let a = event_with_data(serde_json::json!({"src": "1.1.1.1"}));
        let b = event_with_data(serde_json::json!({"src": "9.9.9.9"}));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
