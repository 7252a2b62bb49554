//! Command-line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueHint};
use idb_scraper_browser::LaunchOptions;
use idb_scraper_core::{OutputStyle, ScrapeConfig, DEFAULT_OPERATION_TIMEOUT_MS};

#[derive(Parser, Debug)]
#[command(
    name = "idb-scraper",
    version,
    about = "Extract every IndexedDB database of a web page into a JSON file",
    long_about = "Loads URL in a Chromium-family browser, enumerates the IndexedDB databases \
visible to its origin and writes every object store's records to a JSON document. \
Databases and stores that cannot be read are recorded as {\"error\": \"...\"} markers."
)]
pub struct Cli {
    /// Page whose origin's databases are extracted
    #[arg(value_name = "URL")]
    pub url: String,

    /// Output file, replaced if it exists
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = "indexeddb_data.json",
        value_hint = ValueHint::FilePath
    )]
    pub output: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visible: bool,

    /// Page-level timeout for launch and navigation, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    pub timeout: u64,

    /// Wait after the page loads so its scripts can create databases
    #[arg(long, value_name = "MS", default_value_t = 2_000)]
    pub settle: u64,

    /// Bound for each in-page storage operation, 0 disables
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_OPERATION_TIMEOUT_MS)]
    pub operation_timeout: u64,

    /// Databases extracted at once
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Object stores of one database extracted at once
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub store_concurrency: u16,

    /// Browser executable
    #[arg(long, value_name = "PATH", env = "IDB_SCRAPER_CHROME", value_hint = ValueHint::ExecutablePath)]
    pub chrome: Option<PathBuf>,

    /// Attach to a running browser (ws://… or http://host:port) instead of launching one
    #[arg(long, value_name = "ENDPOINT", conflicts_with_all = ["visible", "chrome"])]
    pub connect: Option<String>,

    /// Write single-line JSON
    #[arg(long)]
    pub compact: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: !self.visible,
            executable: self.chrome.clone(),
            startup_timeout: self.page_timeout(),
            ..LaunchOptions::default()
        }
    }

    pub fn scrape_config(&self) -> ScrapeConfig {
        let operation_timeout = match self.operation_timeout {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ScrapeConfig::new()
            .with_operation_timeout(operation_timeout)
            .with_database_concurrency(usize::from(self.concurrency))
            .with_store_concurrency(usize::from(self.store_concurrency))
    }

    pub fn output_style(&self) -> OutputStyle {
        if self.compact {
            OutputStyle::Compact
        } else {
            OutputStyle::Pretty
        }
    }
}
