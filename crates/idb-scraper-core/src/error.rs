//! Engine error types

use std::time::Duration;

use thiserror::Error;

use crate::protocol::FailureKind;

/// A failure inside the database/store traversal.
///
/// The display form is the underlying message alone: it is what lands in the
/// `{"error": ...}` marker of the output document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{0}")]
    EnumerationUnavailable(String),

    #[error("{0}")]
    Open(String),

    #[error("{0}")]
    SchemaRead(String),

    #[error("{0}")]
    Transaction(String),

    #[error("{0}")]
    Scan(String),
}

impl ExtractError {
    pub fn from_failure(kind: FailureKind, message: String) -> Self {
        match kind {
            FailureKind::Unavailable => ExtractError::EnumerationUnavailable(message),
            FailureKind::Open => ExtractError::Open(message),
            FailureKind::SchemaRead => ExtractError::SchemaRead(message),
            FailureKind::Transaction => ExtractError::Transaction(message),
            FailureKind::Scan => ExtractError::Scan(message),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::EnumerationUnavailable(_) => FailureKind::Unavailable,
            ExtractError::Open(_) => FailureKind::Open,
            ExtractError::SchemaRead(_) => FailureKind::SchemaRead,
            ExtractError::Transaction(_) => FailureKind::Transaction,
            ExtractError::Scan(_) => FailureKind::Scan,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ExtractError::EnumerationUnavailable(m)
            | ExtractError::Open(m)
            | ExtractError::SchemaRead(m)
            | ExtractError::Transaction(m)
            | ExtractError::Scan(m) => m,
        }
    }
}

/// Transport-level failure of a page round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Page connection closed")]
    Closed,

    #[error("Timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Malformed reply: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
