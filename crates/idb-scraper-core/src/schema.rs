//! Schema walker

use serde_json::Value;

use crate::channel::{self, StorageChannel};
use crate::config::ScrapeConfig;
use crate::error::ExtractError;
use crate::protocol::{ScriptReply, StorageRequest};
use crate::Result;

/// Open `database` without a version and read its object store names.
///
/// The in-page connection is closed on every path before the reply is sent.
/// Transport failures and deadline expiry surface as [`ExtractError::Open`].
pub async fn list_object_stores<C>(
    channel: &C,
    database: &str,
    config: &ScrapeConfig,
) -> Result<Vec<String>>
where
    C: StorageChannel + ?Sized,
{
    let request = StorageRequest::list_object_stores(database);
    let reply = channel::call(channel, &request, config)
        .await
        .map_err(|e| ExtractError::Open(e.to_string()))?;

    match reply {
        ScriptReply::Ok { value } => store_names(value),
        ScriptReply::Error { kind, message } => Err(ExtractError::from_failure(kind, message)),
    }
}

fn store_names(value: Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(ExtractError::SchemaRead(format!(
            "Expected a list of object store names, got {}",
            value
        )));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            other => Err(ExtractError::SchemaRead(format!(
                "Object store name is not a string: {}",
                other
            ))),
        })
        .collect()
}
