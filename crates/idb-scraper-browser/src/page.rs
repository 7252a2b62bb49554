//! Page session
//!
//! One browser tab reached through a flattened DevTools session. Besides
//! navigation it is the [`StorageChannel`] the extraction engine talks to.

use async_trait::async_trait;
use idb_scraper_core::{ChannelError, StorageChannel, StorageRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cdp::CdpConnection;
use crate::error::BrowserError;
use crate::Result;

const READY_POLL: Duration = Duration::from_millis(100);

pub struct Page {
    connection: Arc<CdpConnection>,
    target_id: String,
    session_id: String,
    timeout: Duration,
}

impl Page {
    pub(crate) fn new(
        connection: Arc<CdpConnection>,
        target_id: String,
        session_id: String,
        timeout: Duration,
    ) -> Self {
        Self {
            connection,
            target_id,
            session_id,
            timeout,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.connection
            .call(method, params, Some(&self.session_id))
            .await
    }

    /// Navigate and wait until `document.readyState` is `complete`
    pub async fn navigate(&self, url: &str) -> Result<()> {
        tracing::info!(url = %url, "Navigating");
        let deadline = Instant::now() + self.timeout;

        let navigation = self.call("Page.navigate", json!({ "url": url }));
        let reply = tokio::time::timeout_at(deadline, navigation)
            .await
            .map_err(|_| BrowserError::timeout(format!("Navigation to {}", url), self.timeout))??;

        if let Some(reason) = reply
            .get("errorText")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }

        loop {
            let state = tokio::time::timeout_at(deadline, self.evaluate("document.readyState"))
                .await
                .map_err(|_| {
                    BrowserError::timeout(format!("Loading {}", url), self.timeout)
                })?;

            // A navigation in flight can destroy the execution context; retry
            match state {
                Ok(Value::String(s)) if s == "complete" => break,
                Ok(_) => {}
                Err(BrowserError::Evaluation(e)) => {
                    tracing::trace!(error = %e, "readyState probe failed");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + READY_POLL >= deadline {
                return Err(BrowserError::timeout(format!("Loading {}", url), self.timeout));
            }
            tokio::time::sleep(READY_POLL).await;
        }

        tracing::debug!(url = %url, "Page loaded");
        Ok(())
    }

    /// Give the page's own scripts time to create their databases
    pub async fn settle(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tracing::debug!(ms = duration.as_millis() as u64, "Waiting for page to settle");
        tokio::time::sleep(duration).await;
    }

    /// Evaluate an expression, awaiting a returned promise, and return its
    /// JSON value
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let reply = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;
        decode_evaluation(reply)
    }

    pub async fn current_url(&self) -> Result<String> {
        match self.evaluate("location.href").await? {
            Value::String(url) => Ok(url),
            other => Err(BrowserError::Evaluation(format!(
                "location.href is not a string: {}",
                other
            ))),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.connection
            .call(
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
                None,
            )
            .await?;
        tracing::debug!(target_id = %self.target_id, "Closed page");
        Ok(())
    }
}

fn decode_evaluation(reply: Value) -> Result<Value> {
    if let Some(details) = reply.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .and_then(|v| v.as_str())
            .or_else(|| details.get("text").and_then(|v| v.as_str()))
            .unwrap_or("Uncaught exception");
        return Err(BrowserError::Evaluation(message.to_string()));
    }

    Ok(reply
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

#[async_trait]
impl StorageChannel for Page {
    async fn request(
        &self,
        request: &StorageRequest,
        operation_timeout: Option<Duration>,
    ) -> std::result::Result<Value, ChannelError> {
        tracing::trace!(request = %request, "Evaluating storage request");
        let expression = request.to_expression(operation_timeout);

        self.evaluate(&expression).await.map_err(|e| match e {
            BrowserError::ConnectionClosed => ChannelError::Closed,
            BrowserError::Timeout { after, .. } => ChannelError::Timeout(after),
            other => ChannelError::Evaluation(other.to_string()),
        })
    }
}
