//! `review-harvest scrape`: scroll the category page and scrape products.

use anyhow::{Context, Result};

use review_harvest::{PageExtractor, ScrapeOutcome, Scraper};

use crate::config::HarvestConfig;
use crate::renderer::ChromiumBrowser;

pub async fn run(config: &HarvestConfig) -> Result<ScrapeOutcome> {
    let extractor =
        PageExtractor::new(config.profile.clone()).context("invalid extraction profile")?;

    let browser = ChromiumBrowser::launch(&config.browser).await?;
    let mut page = browser.new_page().await?;

    let result = Scraper::new(&mut page, &extractor, &config.scrape)
        .run()
        .await;

    // Close the browser even when the scrape failed.
    if let Err(e) = browser.close().await {
        tracing::warn!("Browser shutdown: {e:#}");
    }

    let outcome = result.context("scrape failed")?;
    println!(
        "Scraped {} products ({} links, {} skipped, collection stopped: {}) -> {}",
        outcome.records.len(),
        outcome.links_collected,
        outcome.items_failed,
        outcome.scroll_outcome,
        config.scrape.output.display()
    );
    Ok(outcome)
}
