//! Page channel: the only way the engine reaches the page's storage

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::ScrapeConfig;
use crate::error::ChannelError;
use crate::protocol::{ScriptReply, StorageRequest};

/// Evaluates storage requests inside a loaded page.
///
/// `operation_timeout` is the bound the request's script applies to each of
/// its own suspension points (see [`StorageRequest::to_expression`]).
/// Implementations return the raw JSON envelope produced by the script;
/// decoding and error classification happen in the engine.
#[async_trait]
pub trait StorageChannel: Send + Sync {
    async fn request(
        &self,
        request: &StorageRequest,
        operation_timeout: Option<Duration>,
    ) -> Result<Value, ChannelError>;
}

#[async_trait]
impl<T: StorageChannel + ?Sized> StorageChannel for &T {
    async fn request(
        &self,
        request: &StorageRequest,
        operation_timeout: Option<Duration>,
    ) -> Result<Value, ChannelError> {
        (**self).request(request, operation_timeout).await
    }
}

/// Issue one request under the configured bounds and decode its envelope
pub(crate) async fn call<C>(
    channel: &C,
    request: &StorageRequest,
    config: &ScrapeConfig,
) -> Result<ScriptReply, ChannelError>
where
    C: StorageChannel + ?Sized,
{
    let pending = channel.request(request, config.operation_timeout());
    let raw = match config.channel_deadline() {
        Some(limit) => tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| ChannelError::Timeout(limit))??,
        None => pending.await?,
    };

    ScriptReply::decode(raw)
}
