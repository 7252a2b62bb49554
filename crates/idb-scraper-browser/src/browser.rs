//! Browser handle
//!
//! Either owns a launched browser process or is attached to a browser
//! someone else started. Closing an owned browser shuts the process down;
//! closing an attached one leaves it running.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::cdp::CdpConnection;
use crate::error::BrowserError;
use crate::launcher::{BrowserProcess, LaunchOptions};
use crate::page::Page;
use crate::Result;

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
    #[serde(rename = "Browser", default)]
    browser: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    WebSocket(Url),
    Http(Url),
}

pub struct Browser {
    connection: Arc<CdpConnection>,
    process: Option<BrowserProcess>,
    page_timeout: Duration,
}

impl Browser {
    /// Launch a local browser with a fresh profile
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let process = BrowserProcess::launch(options).await?;
        let connection = CdpConnection::connect(process.ws_url()).await?;

        Ok(Self {
            connection: Arc::new(connection),
            process: Some(process),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        })
    }

    /// Attach to a running browser via `ws://…` or an `http://host:port`
    /// DevTools endpoint
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let ws_url = match classify_endpoint(endpoint)? {
            Endpoint::WebSocket(url) => url.to_string(),
            Endpoint::Http(url) => discover_ws_url(&url).await?,
        };

        tracing::info!(url = %ws_url, "Attaching to running browser");
        let connection = CdpConnection::connect(&ws_url).await?;

        Ok(Self {
            connection: Arc::new(connection),
            process: None,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        })
    }

    /// Bound for navigation and other page-level waits
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Open a blank page with its own DevTools session
    pub async fn new_page(&self) -> Result<Page> {
        let created = self
            .connection
            .call("Target.createTarget", json!({ "url": "about:blank" }), None)
            .await?;
        let target_id = string_field(&created, "targetId", "Target.createTarget")?;

        let attached = self
            .connection
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = string_field(&attached, "sessionId", "Target.attachToTarget")?;

        tracing::debug!(target_id = %target_id, session_id = %session_id, "Opened page");

        Ok(Page::new(
            Arc::clone(&self.connection),
            target_id,
            session_id,
            self.page_timeout,
        ))
    }

    /// Release the browser: shut down a launched one, detach from an
    /// attached one
    pub async fn close(mut self) -> Result<()> {
        let Some(process) = self.process.take() else {
            tracing::debug!("Detached from running browser");
            return Ok(());
        };

        let request = self.connection.call("Browser.close", json!({}), None);
        match tokio::time::timeout(CLOSE_GRACE, request).await {
            Ok(Ok(_)) | Ok(Err(BrowserError::ConnectionClosed)) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Browser.close failed"),
            Err(_) => tracing::debug!("Browser.close did not answer"),
        }

        process.shutdown(CLOSE_GRACE).await;
        tracing::info!("Browser closed");
        Ok(())
    }
}

fn string_field(value: &serde_json::Value, field: &str, method: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol {
            method: method.to_string(),
            message: format!("response has no {}", field),
        })
}

fn classify_endpoint(endpoint: &str) -> Result<Endpoint> {
    let trimmed = endpoint.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| BrowserError::Discovery(format!("invalid endpoint {}: {}", endpoint, e)))?;

    match url.scheme() {
        "ws" | "wss" => Ok(Endpoint::WebSocket(url)),
        "http" | "https" => Ok(Endpoint::Http(url)),
        other => Err(BrowserError::Discovery(format!(
            "unsupported endpoint scheme: {}",
            other
        ))),
    }
}

async fn discover_ws_url(base: &Url) -> Result<String> {
    let version_url = base
        .join("/json/version")
        .map_err(|e| BrowserError::Discovery(e.to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| BrowserError::Discovery(e.to_string()))?;

    let resp = client
        .get(version_url.clone())
        .send()
        .await
        .map_err(|e| BrowserError::Discovery(format!("{}: {}", version_url, e)))?;

    if !resp.status().is_success() {
        return Err(BrowserError::Discovery(format!(
            "{}: HTTP {}",
            version_url,
            resp.status()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| BrowserError::Discovery(e.to_string()))?;

    parse_version_info(&body)
}

fn parse_version_info(body: &str) -> Result<String> {
    let info: VersionInfo = serde_json::from_str(body)
        .map_err(|e| BrowserError::Discovery(format!("unexpected /json/version reply: {}", e)))?;

    if let Some(browser) = &info.browser {
        tracing::debug!(browser = %browser, "Discovered browser");
    }
    Ok(info.web_socket_debugger_url)
}
