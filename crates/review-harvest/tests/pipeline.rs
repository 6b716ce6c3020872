//! End-to-end flow over a scripted catalog: scroll, scrape, clean, report.

use std::collections::HashMap;

use async_trait::async_trait;
use review_harvest::checkpoint::CheckpointSettings;
use review_harvest::dataset::{self, SAMPLE_SEED, SAMPLE_SIZE};
use review_harvest::links::ScrollSettings;
use review_harvest::scrape::DelayRange;
use review_harvest::{
    BrowserPage, ExtractionProfile, HarvestError, HarvestResult, PageExtractor, PageSnapshot,
    ScrapeSettings, Scraper, ScrollOutcome, StatsReport, Theme,
};

const CATEGORY: &str = "https://shop.example/category/phones/";

/// A catalog whose category feed grows for two scrolls and then stalls.
struct FakeCatalog {
    current: String,
    scrolls: usize,
    feed: Vec<Vec<String>>,
    pages: HashMap<String, String>,
    visited: Vec<String>,
}

impl FakeCatalog {
    fn new() -> Self {
        let feed = vec![
            vec![
                "https://shop.example/product/a/?from=feed".to_string(),
                "https://shop.example/product/a/reviews/".to_string(),
                "https://shop.example/product/b/".to_string(),
            ],
            vec![
                "https://shop.example/product/a/".to_string(),
                "https://shop.example/product/b/?utm=x".to_string(),
                "https://shop.example/product/c/".to_string(),
                "https://shop.example/help/".to_string(),
            ],
        ];

        let mut pages = HashMap::new();
        pages.insert(
            "https://shop.example/product/a/".to_string(),
            page(r#"<h1>Смартфон Alpha 8/256</h1><div><span class="x b35_3_16 y">Store Alpha</span></div>"#),
        );
        pages.insert(
            "https://shop.example/product/a/reviews/".to_string(),
            page(
                r#"<span>12&nbsp;990 ₽</span>
                   <div class="zM_28">4,7 / 5</div>
                   <p>7 декабря 2025</p>
                   <div><span>Отличный телефон, камера снимает очень хорошо даже ночью</span></div>
                   <div><span>Батарея держит два дня при активном использовании, доволен</span></div>"#,
            ),
        );
        // b has a card but its reviews page fails to load.
        pages.insert(
            "https://shop.example/product/b/".to_string(),
            page("<h1>Смартфон Beta</h1>"),
        );
        pages.insert(
            "https://shop.example/product/c/".to_string(),
            page("<div>нет заголовка</div>"),
        );
        pages.insert(
            "https://shop.example/product/c/reviews/".to_string(),
            page("<p>Отзывов пока нет</p>"),
        );

        Self {
            current: String::new(),
            scrolls: 0,
            feed,
            pages,
            visited: Vec::new(),
        }
    }
}

fn page(body: &str) -> String {
    format!("<html><body>{body}</body></html>")
}

#[async_trait]
impl BrowserPage for FakeCatalog {
    async fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        self.visited.push(url.to_string());
        if url == CATEGORY || self.pages.contains_key(url) {
            self.current = url.to_string();
            Ok(())
        } else {
            Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_ABORTED".to_string(),
            })
        }
    }

    async fn scroll_by(&mut self, _pixels: i64) -> HarvestResult<()> {
        self.scrolls += 1;
        Ok(())
    }

    async fn scroll_height(&mut self) -> HarvestResult<i64> {
        Ok(if self.scrolls < 2 { 4000 } else { 6500 })
    }

    async fn anchor_hrefs(&mut self) -> HarvestResult<Vec<String>> {
        let i = self.scrolls.saturating_sub(1).min(self.feed.len() - 1);
        Ok(self.feed[i].clone())
    }

    async fn snapshot(&mut self) -> HarvestResult<PageSnapshot> {
        let html = self.pages.get(&self.current).cloned().unwrap_or_default();
        Ok(PageSnapshot::from_html(self.current.clone(), html))
    }
}

fn settings(output: std::path::PathBuf, max_items: usize) -> ScrapeSettings {
    ScrapeSettings {
        category_url: CATEGORY.to_string(),
        max_items,
        output,
        scroll: ScrollSettings {
            delay_ms: 0,
            settle_ms: 0,
            ..ScrollSettings::default()
        },
        product_delay: DelayRange::fixed(0),
        reviews_delay: DelayRange::fixed(0),
        checkpoint: CheckpointSettings {
            every: 2,
            pause_ms: 0,
        },
    }
}

#[tokio::test]
async fn test_full_scrape_skips_failed_items() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("raw.csv");
    let extractor = PageExtractor::new(ExtractionProfile::default()).unwrap();
    let settings = settings(output.clone(), 10);
    let mut catalog = FakeCatalog::new();

    let outcome = Scraper::new(&mut catalog, &extractor, &settings)
        .run()
        .await
        .unwrap();

    // Height changes once (scroll 2) and then stays put for six scrolls.
    assert_eq!(outcome.scroll_outcome, ScrollOutcome::FeedExhausted);
    assert_eq!(outcome.scrolls, 8);
    assert_eq!(outcome.links_collected, 3);
    assert_eq!(outcome.items_failed, 1);
    assert_eq!(outcome.checkpoints, 1);
    assert_eq!(outcome.records.len(), 2);

    let alpha = &outcome.records[0];
    assert_eq!(alpha.title, "Смартфон Alpha 8/256");
    assert_eq!(alpha.seller, "Store Alpha");
    assert_eq!(alpha.rating, Some(4.7));
    assert_eq!(alpha.first_review_date_text.as_deref(), Some("7 декабря 2025"));
    assert!(alpha.raw_price.as_deref().unwrap().contains('₽'));
    let review = alpha.review_text.as_deref().unwrap();
    assert_eq!(review.matches(" || ").count(), 1);

    let placeholder = &outcome.records[1];
    assert_eq!(placeholder.title, "Название не найдено");
    assert_eq!(placeholder.seller, "Не найден");
    assert_eq!(placeholder.raw_price, None);
    assert_eq!(placeholder.review_text, None);

    assert!(catalog
        .visited
        .contains(&"https://shop.example/product/b/reviews/".to_string()));

    // The file on disk matches the final record list.
    let rows = dataset::read_raw(&output).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].source_url.as_deref(), Some("https://shop.example/product/a/"));
}

#[tokio::test]
async fn test_scrape_stops_at_target() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = PageExtractor::new(ExtractionProfile::default()).unwrap();
    let settings = settings(dir.path().join("raw.csv"), 2);
    let mut catalog = FakeCatalog::new();

    let outcome = Scraper::new(&mut catalog, &extractor, &settings)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.scroll_outcome, ScrollOutcome::TargetReached);
    assert_eq!(outcome.scrolls, 1);
    assert_eq!(outcome.links_collected, 2);
    assert!(!catalog
        .visited
        .contains(&"https://shop.example/product/c/".to_string()));
}

#[tokio::test]
async fn test_scraped_file_feeds_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("raw.csv");
    let profile = ExtractionProfile::default();
    let extractor = PageExtractor::new(profile.clone()).unwrap();
    let settings = settings(raw_path.clone(), 10);
    let mut catalog = FakeCatalog::new();
    Scraper::new(&mut catalog, &extractor, &settings)
        .run()
        .await
        .unwrap();

    let rows = dataset::read_raw(&raw_path).unwrap();
    let cleaned = dataset::clean_records(&rows, &profile);
    // Only the record with a price and a rating survives.
    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].price, 12990.0);
    assert_eq!(cleaned[0].theme, Theme::Camera);
    assert!(cleaned[0].has_review);

    let report = StatsReport::compute(&cleaned);
    assert_eq!(report.rows, 1);
    assert_eq!(report.top_seller.as_deref(), Some("Store Alpha"));
    assert_eq!(report.reviews_by_year[0].label, "2025");

    let sample = dataset::sample_for_annotation(&cleaned, SAMPLE_SIZE, SAMPLE_SEED);
    let sample_path = dir.path().join("sample.csv");
    dataset::write_sample(&sample_path, &sample).unwrap();
    let texts = review_harvest::annotate::read_review_texts(&sample_path, 200).unwrap();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("камера"));
}
