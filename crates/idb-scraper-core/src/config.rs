//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound for a single in-page suspension point (open, list, scan)
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// The channel deadline is this many operation timeouts. An extraction has
/// two bounded suspension points (open, then the key/value scan) inside the
/// page, so the outer deadline only fires when the page itself is wedged.
const CHANNEL_DEADLINE_FACTOR: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Per-suspension-point timeout in milliseconds, 0 disables
    pub operation_timeout_ms: u64,
    /// Databases processed at once
    pub database_concurrency: usize,
    /// Stores of one database processed at once
    pub store_concurrency: usize,
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            database_concurrency: 1,
            store_concurrency: 1,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout_ms = timeout_millis(timeout);
        self
    }

    pub fn with_database_concurrency(mut self, limit: usize) -> Self {
        self.database_concurrency = limit;
        self
    }

    pub fn with_store_concurrency(mut self, limit: usize) -> Self {
        self.store_concurrency = limit;
        self
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Deadline for one page round trip
    pub fn channel_deadline(&self) -> Option<Duration> {
        self.operation_timeout().map(|timeout| {
            timeout
                .checked_mul(CHANNEL_DEADLINE_FACTOR)
                .unwrap_or(Duration::MAX)
        })
    }

    pub(crate) fn database_limit(&self) -> usize {
        self.database_concurrency.max(1)
    }

    pub(crate) fn store_limit(&self) -> usize {
        self.store_concurrency.max(1)
    }
}

/// Whole milliseconds for a timeout, where `0` means unbounded. A non-zero
/// timeout never rounds down to `0`.
pub(crate) fn timeout_millis(timeout: Option<Duration>) -> u64 {
    match timeout {
        None => 0,
        Some(t) if t.is_zero() => 0,
        Some(t) => u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1),
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScrapeConfig::default();
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.channel_deadline(), Some(Duration::from_secs(90)));
        assert_eq!(config.database_limit(), 1);
        assert_eq!(config.store_limit(), 1);
    }

    #[test]
    fn test_zero_timeout_disables_bounds() {
        let config = ScrapeConfig::new().with_operation_timeout(None);
        assert_eq!(config.operation_timeout_ms, 0);
        assert_eq!(config.operation_timeout(), None);
        assert_eq!(config.channel_deadline(), None);
    }

    #[test]
    fn test_sub_millisecond_timeout_stays_bounded() {
        let config = ScrapeConfig::new().with_operation_timeout(Some(Duration::from_micros(500)));
        assert_eq!(config.operation_timeout_ms, 1);
        assert_eq!(config.operation_timeout(), Some(Duration::from_millis(1)));
        assert_eq!(config.channel_deadline(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = ScrapeConfig::new().with_operation_timeout(Some(Duration::MAX));
        assert_eq!(config.operation_timeout_ms, u64::MAX);
        assert_eq!(config.channel_deadline(), Some(Duration::MAX));
        assert_eq!(timeout_millis(Some(Duration::ZERO)), 0);
    }

    #[test]
    fn test_zero_concurrency_means_sequential() {
        let config = ScrapeConfig::new()
            .with_database_concurrency(0)
            .with_store_concurrency(0);
        assert_eq!(config.database_limit(), 1);
        assert_eq!(config.store_limit(), 1);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ScrapeConfig = serde_json::from_str(r#"{"store_concurrency": 4}"#).unwrap();
        assert_eq!(config.store_concurrency, 4);
        assert_eq!(config.operation_timeout_ms, DEFAULT_OPERATION_TIMEOUT_MS);
        assert_eq!(config.database_concurrency, 1);
    }
}
