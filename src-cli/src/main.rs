//! idb-scraper CLI
//!
//! Loads a page in a browser, hands the page to the extraction engine and
//! writes the resulting document. Only browser setup, navigation and export
//! failures make the process exit non-zero; unreadable databases and stores
//! are recorded in the document instead.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use idb_scraper_browser::Browser;
use idb_scraper_core::{export_to_json, ExtractionResult, Scraper};
use url::Url;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        idb_scraper_core::init_logging_with_default("debug");
    } else {
        idb_scraper_core::init_logging();
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let url = Url::parse(&cli.url).with_context(|| format!("Invalid URL: {}", cli.url))?;

    let browser = match &cli.connect {
        Some(endpoint) => Browser::connect(endpoint)
            .await
            .with_context(|| format!("Could not attach to browser at {}", endpoint))?,
        None => Browser::launch(&cli.launch_options())
            .await
            .context("Could not launch browser")?,
    }
    .with_page_timeout(cli.page_timeout());

    let scraped = scrape(&browser, cli, &url).await;

    if let Err(e) = browser.close().await {
        tracing::warn!(error = %e, "Browser did not close cleanly");
    }

    let result = scraped?;
    export_to_json(&result, &cli.output, cli.output_style())
        .with_context(|| format!("Could not write {}", cli.output.display()))?;

    let summary = result.summary();
    tracing::info!(
        databases = summary.databases,
        failed_databases = summary.failed_databases,
        stores = summary.stores,
        failed_stores = summary.failed_stores,
        records = summary.records,
        output = %cli.output.display(),
        "Extraction complete"
    );
    Ok(())
}

/// Open a page, load `url` and run the engine against it. The page is
/// closed on every path once it exists.
async fn scrape(browser: &Browser, cli: &Cli, url: &Url) -> Result<ExtractionResult> {
    let page = browser.new_page().await.context("Could not open a page")?;

    let loaded = page
        .navigate(url.as_str())
        .await
        .with_context(|| format!("Could not load {}", url));

    let result = match loaded {
        Ok(()) => {
            match page.current_url().await {
                Ok(landed) if landed != url.as_str() => {
                    tracing::info!(url = %landed, "Page redirected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Could not read page URL"),
            }
            page.settle(cli.settle_time()).await;
            Ok(Scraper::new(&page, cli.scrape_config()).run().await)
        }
        Err(e) => Err(e),
    };

    if let Err(e) = page.close().await {
        tracing::debug!(error = %e, "Page did not close cleanly");
    }
    result
}
