//! Aggregator
//!
//! Per run:
//! ```text
//! Discover
//!   ↓ no names → empty result
//! WalkSchema (per database)
//!   ↓ failure → database entry = {error}
//! ExtractStores (per store)
//!   ↓ failure → store entry = {error}
//! Done
//! ```
//! Failures are caught at the smallest enclosing scope and never abort
//! sibling databases or stores.

use futures_util::stream::{self, StreamExt};

use crate::channel::StorageChannel;
use crate::config::ScrapeConfig;
use crate::enumerator::list_databases;
use crate::extractor::extract_store;
use crate::result::{DatabaseExtraction, Extracted, ExtractionResult, StoreExtraction};
use crate::schema::list_object_stores;

pub struct Scraper<'a, C: StorageChannel + ?Sized> {
    channel: &'a C,
    config: ScrapeConfig,
}

impl<'a, C: StorageChannel + ?Sized> Scraper<'a, C> {
    pub fn new(channel: &'a C, config: ScrapeConfig) -> Self {
        Self { channel, config }
    }

    /// Scrape every database visible to the page. Never fails: failures are
    /// recorded inside the result.
    pub async fn run(&self) -> ExtractionResult {
        let mut result = ExtractionResult::new();

        let names = list_databases(self.channel, &self.config).await;
        if names.is_empty() {
            tracing::warn!("No IndexedDB databases found");
            return result;
        }

        tracing::info!(
            count = names.len(),
            databases = %names.join(", "),
            "Found databases"
        );

        let databases = stream::iter(names)
            .map(|name| self.scrape_database(name))
            .buffered(self.config.database_limit())
            .collect::<Vec<_>>()
            .await;

        for database in databases {
            result.push(database);
        }

        result
    }

    async fn scrape_database(&self, name: String) -> DatabaseExtraction {
        let stores = match list_object_stores(self.channel, &name, &self.config).await {
            Ok(stores) => stores,
            Err(err) => {
                tracing::warn!(
                    database = %name,
                    kind = %err.kind(),
                    error = %err,
                    "Failed to process database"
                );
                return DatabaseExtraction {
                    name,
                    outcome: Extracted::Failed(err.into()),
                };
            }
        };

        tracing::info!(
            database = %name,
            count = stores.len(),
            stores = %stores.join(", "),
            "Found object stores"
        );

        let extracted = stream::iter(stores)
            .map(|store| self.scrape_store(&name, store))
            .buffered(self.config.store_limit())
            .collect::<Vec<_>>()
            .await;

        DatabaseExtraction {
            name,
            outcome: Extracted::Data(extracted),
        }
    }

    async fn scrape_store(&self, database: &str, store: String) -> StoreExtraction {
        let outcome = match extract_store(self.channel, database, &store, &self.config).await {
            Ok(records) => {
                tracing::info!(
                    database = %database,
                    store = %store,
                    count = records.len(),
                    "Extracted object store"
                );
                Extracted::Data(records)
            }
            Err(err) => {
                tracing::warn!(
                    database = %database,
                    store = %store,
                    kind = %err.kind(),
                    error = %err,
                    "Failed to extract object store"
                );
                Extracted::Failed(err.into())
            }
        };

        StoreExtraction {
            name: store,
            outcome,
        }
    }
}
