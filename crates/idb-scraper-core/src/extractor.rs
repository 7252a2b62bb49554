//! Store extractor

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::channel::{self, StorageChannel};
use crate::config::ScrapeConfig;
use crate::error::ExtractError;
use crate::protocol::{ScriptReply, StorageRequest};
use crate::Result;

/// Decoded key → value records of one object store, in native key order
pub type StoreRecords = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct ScanPayload {
    keys: Vec<Value>,
    values: Vec<Value>,
}

/// Full scan of one object store inside a readonly transaction.
///
/// Transport failures and deadline expiry surface as [`ExtractError::Scan`].
pub async fn extract_store<C>(
    channel: &C,
    database: &str,
    store: &str,
    config: &ScrapeConfig,
) -> Result<StoreRecords>
where
    C: StorageChannel + ?Sized,
{
    let request = StorageRequest::extract_store(database, store);
    let reply = channel::call(channel, &request, config)
        .await
        .map_err(|e| ExtractError::Scan(e.to_string()))?;

    let value = match reply {
        ScriptReply::Ok { value } => value,
        ScriptReply::Error { kind, message } => {
            return Err(ExtractError::from_failure(kind, message))
        }
    };

    let payload: ScanPayload = serde_json::from_value(value)
        .map_err(|e| ExtractError::Scan(format!("Malformed scan payload: {}", e)))?;

    let records = pair_records(payload.keys, payload.values)?;
    tracing::trace!(database, store, count = records.len(), "Paired store records");
    Ok(records)
}

/// Pair the i-th key with the i-th value.
///
/// Both sequences come from the same readonly transaction, so their
/// positions correspond. Keys that stringify identically collapse, last
/// one wins.
pub fn pair_records(keys: Vec<Value>, values: Vec<Value>) -> Result<StoreRecords> {
    if keys.len() != values.len() {
        return Err(ExtractError::Scan(format!(
            "Key/value count mismatch: {} keys, {} values",
            keys.len(),
            values.len()
        )));
    }

    let mut records = Map::with_capacity(keys.len());
    for (key, value) in keys.into_iter().zip(values) {
        let key = key_to_string(&key);
        if records.insert(key.clone(), value).is_some() {
            tracing::warn!(key = %key, "Distinct keys share a string form, keeping the later value");
        }
    }
    Ok(records)
}

/// Object-key form of a decoded native key
fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOrigin;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_pairing_uses_returned_positions() {
        let records = pair_records(vec![json!("b"), json!("a")], vec![json!(2), json!(1)]).unwrap();

        assert_eq!(records.get("a"), Some(&json!(1)));
        assert_eq!(records.get("b"), Some(&json!(2)));
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_pairing_rejects_length_mismatch() {
        let err = pair_records(vec![json!("a"), json!("b")], vec![json!(1)]).unwrap_err();
        assert!(matches!(err, ExtractError::Scan(ref m) if m.contains("2 keys, 1 values")));
    }

    #[test]
    fn test_key_forms() {
        assert_eq!(key_to_string(&json!("k")), "k");
        assert_eq!(key_to_string(&json!(42)), "42");
        assert_eq!(key_to_string(&json!(42.0)), "42");
        assert_eq!(key_to_string(&json!(-1.5)), "-1.5");
        assert_eq!(key_to_string(&json!(["a", 1])), r#"["a",1]"#);
        assert_eq!(key_to_string(&json!([1, 2, 3])), "[1,2,3]");
    }

    #[test]
    fn test_colliding_keys_keep_later_value() {
        let records =
            pair_records(vec![json!(1), json!("1")], vec![json!("number"), json!("string")]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("1"), Some(&json!("string")));
    }

    #[tokio::test]
    async fn test_extracts_records() {
        let origin = FakeOrigin::new().with_database("app", |db| {
            db.with_store("kv", |s| {
                s.with_record(json!("a"), json!(1))
                    .with_record(json!("b"), json!(2))
            })
        });

        let records = extract_store(&origin, "app", "kv", &ScrapeConfig::default())
            .await
            .unwrap();
        assert_eq!(Value::Object(records), json!({"a": 1, "b": 2}));
        assert_eq!(origin.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_failure_categories() {
        let origin = FakeOrigin::new()
            .with_database("app", |db| {
                db.with_store("stale", |s| s.failing_transaction("NotFoundError"))
                    .with_store("broken", |s| s.failing_scan("Could not get values: AbortError"))
            })
            .with_database("locked", |db| db.failing_open("denied"));
        let config = ScrapeConfig::default();

        assert_eq!(
            extract_store(&origin, "app", "stale", &config).await.unwrap_err(),
            ExtractError::Transaction("NotFoundError".to_string())
        );
        assert_eq!(
            extract_store(&origin, "app", "broken", &config).await.unwrap_err(),
            ExtractError::Scan("Could not get values: AbortError".to_string())
        );
        assert_eq!(
            extract_store(&origin, "locked", "any", &config).await.unwrap_err(),
            ExtractError::Open("denied".to_string())
        );
        assert_eq!(origin.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_scan_error() {
        let origin = FakeOrigin::new().with_database("app", |db| {
            db.with_store("odd", |s| s.replying(json!({"status": "ok", "value": [1, 2]})))
        });

        let err = extract_store(&origin, "app", "odd", &ScrapeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Scan(ref m) if m.starts_with("Malformed scan payload")));
    }

    #[tokio::test]
    async fn test_wedged_scan_times_out() {
        let origin = FakeOrigin::new()
            .with_database("app", |db| db.with_store("slow", |s| s.hanging()));
        let config = ScrapeConfig::new().with_operation_timeout(Some(Duration::from_millis(10)));

        let err = extract_store(&origin, "app", "slow", &config).await.unwrap_err();
        assert_eq!(err, ExtractError::Scan("Timed out after 30 ms".to_string()));
    }
}
