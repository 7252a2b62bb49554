//! Browser error types

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("No Chromium-family browser found; pass an executable path")]
    ExecutableNotFound,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Endpoint discovery failed: {0}")]
    Discovery(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error in {method}: {message}")]
    Protocol { method: String, message: String },

    #[error("{0}")]
    Evaluation(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{what} timed out after {} ms", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("Browser connection closed")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            after,
        }
    }
}
