//! Storage enumerator

use serde_json::Value;

use crate::channel::{self, StorageChannel};
use crate::config::ScrapeConfig;
use crate::error::ExtractError;
use crate::protocol::{ScriptReply, StorageRequest};

/// List the database names visible to the page's origin.
///
/// Never fails: an unsupported or rejecting enumeration degrades to an empty
/// list and a warning.
pub async fn list_databases<C>(channel: &C, config: &ScrapeConfig) -> Vec<String>
where
    C: StorageChannel + ?Sized,
{
    match try_list_databases(channel, config).await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(error = %err, "IndexedDB enumeration unavailable, treating origin as empty");
            Vec::new()
        }
    }
}

async fn try_list_databases<C>(
    channel: &C,
    config: &ScrapeConfig,
) -> Result<Vec<String>, ExtractError>
where
    C: StorageChannel + ?Sized,
{
    let request = StorageRequest::ListDatabases;
    let reply = channel::call(channel, &request, config)
        .await
        .map_err(|e| ExtractError::EnumerationUnavailable(e.to_string()))?;

    match reply {
        ScriptReply::Ok { value } => Ok(dedup_names(value)),
        ScriptReply::Error { message, .. } => Err(ExtractError::EnumerationUnavailable(message)),
    }
}

/// Keep string names in first-seen order, dropping repeats
fn dedup_names(value: Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if let Value::String(name) = item {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOrigin;
    use serde_json::json;

    #[test]
    fn test_dedup_names() {
        let names = dedup_names(json!(["b", "a", "b", 7, null, "c"]));
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!(dedup_names(json!({"a": 1})).is_empty());
    }

    #[tokio::test]
    async fn test_lists_in_native_order() {
        let origin = FakeOrigin::new()
            .with_database("zeta", |db| db)
            .with_database("alpha", |db| db);

        let names = list_databases(&origin, &ScrapeConfig::default()).await;
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_unsupported_enumeration_is_empty() {
        let origin = FakeOrigin::new()
            .with_database("app", |db| db)
            .without_enumeration();

        let names = list_databases(&origin, &ScrapeConfig::default()).await;
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_broken_channel_is_empty() {
        let origin = FakeOrigin::new()
            .with_database("app", |db| db)
            .with_broken_channel();

        let names = list_databases(&origin, &ScrapeConfig::default()).await;
        assert!(names.is_empty());
    }
}
