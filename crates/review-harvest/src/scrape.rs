//! Scrape orchestration: category page → product page → reviews page.
//!
//! A `Scraper` owns nothing global. It borrows one browser page and an
//! extractor, collects links once, then walks them in discovery order,
//! folding each successfully extracted record into the run's record list.
//! A failure anywhere inside one item skips that item only.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointSettings, CheckpointWriter};
use crate::extract::PageExtractor;
use crate::links::{collect_links, LinkCollection, LinkSet, ScrollOutcome, ScrollSettings};
use crate::page::BrowserPage;
use crate::types::{HarvestResult, ProductRecord};

/// Uniformly random wait, used to avoid a detectable request rhythm.
/// A missing or smaller `max_ms` makes the wait fixed at `min_ms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

/// Settings for one scrape run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Category listing page to scroll.
    pub category_url: String,
    /// Upper bound on links collected and products scraped.
    pub max_items: usize,
    /// Raw-scrape CSV path (checkpoints and final write).
    pub output: PathBuf,
    pub scroll: ScrollSettings,
    /// Wait after opening a product card.
    pub product_delay: DelayRange,
    /// Wait after opening a reviews page.
    pub reviews_delay: DelayRange,
    pub checkpoint: CheckpointSettings,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            category_url: "https://www.ozon.ru/category/smartfony-15502/".to_string(),
            max_items: 1500,
            output: PathBuf::from("products_raw.csv"),
            scroll: ScrollSettings::default(),
            product_delay: DelayRange {
                min_ms: 2000,
                max_ms: 3500,
            },
            reviews_delay: DelayRange {
                min_ms: 3000,
                max_ms: 5000,
            },
            checkpoint: CheckpointSettings::default(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub records: Vec<ProductRecord>,
    pub links_collected: usize,
    pub scroll_outcome: ScrollOutcome,
    pub scrolls: u32,
    pub items_failed: usize,
    pub checkpoints: usize,
}

/// Reviews page of a product: the product URL plus the reviews suffix.
pub fn reviews_url(product_url: &str, suffix: &str) -> String {
    let mut url = product_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(suffix);
    url
}

/// Drives one scrape over a borrowed browser page.
pub struct Scraper<'a, P: BrowserPage + ?Sized> {
    page: &'a mut P,
    extractor: &'a PageExtractor,
    settings: &'a ScrapeSettings,
}

impl<'a, P: BrowserPage + ?Sized> Scraper<'a, P> {
    pub fn new(page: &'a mut P, extractor: &'a PageExtractor, settings: &'a ScrapeSettings) -> Self {
        Self {
            page,
            extractor,
            settings,
        }
    }

    /// Collect links, scrape every product, and write the final table.
    pub async fn run(&mut self) -> HarvestResult<ScrapeOutcome> {
        let collection = self.collect().await?;
        let mut writer = CheckpointWriter::new(
            self.settings.output.clone(),
            self.settings.checkpoint.clone(),
        );

        let (records, items_failed) = self.scrape_links(&collection.links, &mut writer).await?;
        writer.finish(&records)?;

        Ok(ScrapeOutcome {
            links_collected: collection.links.len(),
            scroll_outcome: collection.outcome,
            scrolls: collection.scrolls,
            items_failed,
            checkpoints: writer.checkpoints_written(),
            records,
        })
    }

    /// Scroll the category page until a stop condition holds.
    pub async fn collect(&mut self) -> HarvestResult<LinkCollection> {
        collect_links(
            &mut *self.page,
            &self.settings.category_url,
            self.settings.max_items,
            &self.settings.scroll,
            self.extractor.profile(),
        )
        .await
    }

    /// Scrape up to `max_items` links, checkpointing along the way.
    ///
    /// Returns the committed records and the number of skipped items.
    /// Only checkpoint IO errors abort the loop.
    pub async fn scrape_links(
        &mut self,
        links: &LinkSet,
        writer: &mut CheckpointWriter,
    ) -> HarvestResult<(Vec<ProductRecord>, usize)> {
        let mut records = Vec::new();
        let mut failed = 0usize;

        for (idx, url) in links.iter().take(self.settings.max_items).enumerate() {
            writer.maybe_checkpoint(idx, &records).await?;

            match self.scrape_item(url).await {
                Ok(record) => {
                    let short_title: String = record.title.chars().take(50).collect();
                    tracing::info!(
                        "[{}] {short_title}... | {} | rating={:?} | date={:?}",
                        idx + 1,
                        record.seller,
                        record.rating,
                        record.first_review_date_text
                    );
                    records.push(record);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("[{}] Skipping {url}: {e}", idx + 1);
                }
            }
        }

        Ok((records, failed))
    }

    /// Product card then reviews page for one URL.
    pub async fn scrape_item(&mut self, url: &str) -> HarvestResult<ProductRecord> {
        self.page.navigate(url).await?;
        tokio::time::sleep(self.settings.product_delay.sample()).await;
        let card = self.page.snapshot().await?;
        let product = self.extractor.product_fields(&card);

        let reviews = reviews_url(url, &self.extractor.profile().reviews_suffix);
        self.page.navigate(&reviews).await?;
        tokio::time::sleep(self.settings.reviews_delay.sample()).await;
        let review_page = self.page.snapshot().await?;
        let fields = self.extractor.review_fields(&review_page);

        Ok(ProductRecord {
            title: product.title,
            seller: product.seller,
            raw_price: fields.raw_price,
            rating: fields.rating,
            first_review_date_text: fields.first_review_date_text,
            source_url: url.to_string(),
            review_text: fields.review_text,
        })
    }
}
