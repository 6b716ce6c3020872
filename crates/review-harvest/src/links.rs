//! Product link discovery on an infinite-scroll category page.
//!
//! The collector scrolls by a fixed step, waits for lazy content, and
//! gathers product anchors into a deduplicating `LinkSet`. It stops when
//! the target count is reached, when the page height has stopped changing
//! for more than `stable_height_threshold` consecutive scrolls (the feed is
//! exhausted), or at the hard `max_scrolls` cap.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::page::BrowserPage;
use crate::profile::ExtractionProfile;
use crate::types::HarvestResult;

/// Canonical form of a product URL: query string and fragment removed.
///
/// Used both while collecting and when de-duplicating the cleaned dataset.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Whether an anchor target is a product card (and not a reviews page).
pub fn is_product_link(href: &str, profile: &ExtractionProfile) -> bool {
    href.contains(profile.product_path.as_str()) && !href.contains(profile.reviews_path.as_str())
}

/// Insertion-ordered set of normalized URLs.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert; returns `true` if the URL was new.
    pub fn insert(&mut self, raw: &str) -> bool {
        let url = normalize_url(raw);
        if url.is_empty() || !self.seen.insert(url.clone()) {
            return false;
        }
        self.order.push(url);
        true
    }

    #[cfg(test)]
    fn contains(&self, raw: &str) -> bool {
        self.seen.contains(&normalize_url(raw))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// URLs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

/// Scroll loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    /// Pixels scrolled per iteration.
    pub step_px: i64,
    /// Wait after each scroll for lazy-loaded content.
    pub delay_ms: u64,
    /// Wait after opening the category page.
    pub settle_ms: u64,
    /// Consecutive unchanged heights tolerated before the feed counts as
    /// exhausted.
    pub stable_height_threshold: u32,
    pub max_scrolls: u32,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            step_px: 2500,
            delay_ms: 1300,
            settle_ms: 5000,
            stable_height_threshold: 5,
            max_scrolls: 400,
        }
    }
}

/// Why the scroll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollOutcome {
    TargetReached,
    FeedExhausted,
    IterationCap,
}

impl std::fmt::Display for ScrollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::FeedExhausted => write!(f, "feed exhausted"),
            Self::IterationCap => write!(f, "iteration cap"),
        }
    }
}

/// Page-height tracking between scrolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub last_height: i64,
    pub unchanged_count: u32,
}

impl ScrollState {
    /// Record the height seen after a scroll; returns `true` once the
    /// height has been unchanged more than `threshold` times in a row.
    pub fn observe(&mut self, height: i64, threshold: u32) -> bool {
        if height == self.last_height {
            self.unchanged_count += 1;
        } else {
            self.unchanged_count = 0;
        }
        self.last_height = height;
        self.unchanged_count > threshold
    }
}

/// Result of a collection run.
#[derive(Debug, Clone)]
pub struct LinkCollection {
    pub links: LinkSet,
    pub outcome: ScrollOutcome,
    /// Number of scrolls performed.
    pub scrolls: u32,
}

/// Open the category page and scroll until a stop condition holds.
pub async fn collect_links<P: BrowserPage + ?Sized>(
    page: &mut P,
    category_url: &str,
    target: usize,
    settings: &ScrollSettings,
    profile: &ExtractionProfile,
) -> HarvestResult<LinkCollection> {
    tracing::info!("Opening category page {category_url}");
    page.navigate(category_url).await?;
    tokio::time::sleep(Duration::from_millis(settings.settle_ms)).await;

    let mut links = LinkSet::new();
    let mut state = ScrollState::default();
    let mut scrolls = 0u32;

    let outcome = loop {
        if scrolls >= settings.max_scrolls {
            break ScrollOutcome::IterationCap;
        }
        scrolls += 1;

        page.scroll_by(settings.step_px).await?;
        tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;

        let hrefs = match page.anchor_hrefs().await {
            Ok(hrefs) => hrefs,
            Err(e) => {
                tracing::warn!("Anchor query failed on scroll {scrolls}: {e}");
                Vec::new()
            }
        };
        for href in hrefs.iter().filter(|h| is_product_link(h, profile)) {
            links.insert(href);
        }

        tracing::info!(
            "Scroll {scrolls}/{}: {} links collected",
            settings.max_scrolls,
            links.len()
        );

        if links.len() >= target {
            break ScrollOutcome::TargetReached;
        }

        let height = page.scroll_height().await?;
        if state.observe(height, settings.stable_height_threshold) {
            break ScrollOutcome::FeedExhausted;
        }
    };

    tracing::info!(
        "Link collection finished ({outcome}) after {scrolls} scrolls: {} links",
        links.len()
    );

    Ok(LinkCollection {
        links,
        outcome,
        scrolls,
    })
}
