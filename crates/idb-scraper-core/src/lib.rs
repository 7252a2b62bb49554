//! idb-scraper Core
//!
//! Enumeration-and-extraction engine for a page's IndexedDB storage.
//!
//! ```text
//! origin
//!   ↓ list databases
//! database names
//!   ↓ open, read objectStoreNames
//! object store names
//!   ↓ readonly getAllKeys + getAll
//! key → value records
//! ```
//!
//! The engine never talks to a browser directly. It drives a
//! [`StorageChannel`], which evaluates the fixed set of in-page requests in
//! [`StorageRequest`] and hands back their JSON replies.

mod channel;
mod config;
mod enumerator;
mod error;
mod export;
mod extractor;
mod protocol;
mod result;
mod schema;
mod scraper;
mod scripts;

#[cfg(test)]
mod testing;

pub use channel::StorageChannel;
pub use config::{ScrapeConfig, DEFAULT_OPERATION_TIMEOUT_MS};
pub use enumerator::list_databases;
pub use error::{ChannelError, ExportError, ExtractError};
pub use export::{export_to_json, OutputStyle};
pub use extractor::{extract_store, pair_records, StoreRecords};
pub use protocol::{FailureKind, ScriptReply, StorageRequest};
pub use result::{
    DatabaseExtraction, ErrorMarker, Extracted, ExtractionResult, RunSummary, StoreExtraction,
};
pub use schema::list_object_stores;
pub use scraper::Scraper;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Initialize logging
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a fallback level used when `RUST_LOG` is unset
pub fn init_logging_with_default(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
