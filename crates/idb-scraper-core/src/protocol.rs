//! In-page request contract
//!
//! Three request shapes cross the page boundary. Each one renders to a
//! self-contained expression whose promise always resolves to an envelope:
//!
//! ```text
//! {"status": "ok",    "value": ...}
//! {"status": "error", "kind": "open", "message": "..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::timeout_millis;
use crate::error::ChannelError;
use crate::scripts;

/// Largest delay `setTimeout` honours
const MAX_TIMER_MS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRequest {
    ListDatabases,
    ListObjectStores { database: String },
    ExtractStore { database: String, store: String },
}

impl StorageRequest {
    pub fn list_object_stores(database: impl Into<String>) -> Self {
        StorageRequest::ListObjectStores {
            database: database.into(),
        }
    }

    pub fn extract_store(database: impl Into<String>, store: impl Into<String>) -> Self {
        StorageRequest::ExtractStore {
            database: database.into(),
            store: store.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageRequest::ListDatabases => "list-databases",
            StorageRequest::ListObjectStores { .. } => "list-object-stores",
            StorageRequest::ExtractStore { .. } => "extract-store",
        }
    }

    /// Arguments handed to the request's script
    pub fn arguments(&self, operation_timeout: Option<Duration>) -> Value {
        // setTimeout fires at once past i32::MAX ms
        let timeout_ms = timeout_millis(operation_timeout).min(MAX_TIMER_MS);
        match self {
            StorageRequest::ListDatabases => json!({ "timeoutMs": timeout_ms }),
            StorageRequest::ListObjectStores { database } => json!({
                "database": database,
                "timeoutMs": timeout_ms,
            }),
            StorageRequest::ExtractStore { database, store } => json!({
                "database": database,
                "store": store,
                "timeoutMs": timeout_ms,
            }),
        }
    }

    /// Render the expression to evaluate in the page
    pub fn to_expression(&self, operation_timeout: Option<Duration>) -> String {
        let body = match self {
            StorageRequest::ListDatabases => scripts::LIST_DATABASES,
            StorageRequest::ListObjectStores { .. } => scripts::LIST_OBJECT_STORES,
            StorageRequest::ExtractStore { .. } => scripts::EXTRACT_STORE,
        };
        let args = self.arguments(operation_timeout);

        format!(
            "(() => {{\n{prelude}\nreturn ({body})({args});\n}})()",
            prelude = scripts::PRELUDE,
            body = body.trim(),
            args = args,
        )
    }
}

impl std::fmt::Display for StorageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure category reported by a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    Open,
    SchemaRead,
    Transaction,
    Scan,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Open => "open",
            FailureKind::SchemaRead => "schema_read",
            FailureKind::Transaction => "transaction",
            FailureKind::Scan => "scan",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoded script envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScriptReply {
    Ok {
        #[serde(default)]
        value: Value,
    },
    Error {
        kind: FailureKind,
        message: String,
    },
}

impl ScriptReply {
    pub fn ok(value: Value) -> Self {
        ScriptReply::Ok { value }
    }

    pub fn error(kind: FailureKind, message: impl Into<String>) -> Self {
        ScriptReply::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn decode(raw: Value) -> Result<Self, ChannelError> {
        serde_json::from_value(raw).map_err(|e| ChannelError::Malformed(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        match self {
            ScriptReply::Ok { value } => json!({ "status": "ok", "value": value }),
            ScriptReply::Error { kind, message } => json!({
                "status": "error",
                "kind": kind.as_str(),
                "message": message,
            }),
        }
    }
}
