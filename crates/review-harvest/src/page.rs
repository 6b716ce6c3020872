//! Browser abstraction and rendered-page snapshots.
//!
//! The scrape stages only talk to a page through `BrowserPage`, so the
//! Chromium-backed implementation in the CLI crate and the scripted pages
//! used in tests are interchangeable. Field extraction never touches the
//! live page: it works on a `PageSnapshot` of the rendered HTML.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::types::HarvestResult;

/// A single controllable browser tab.
#[async_trait]
pub trait BrowserPage: Send {
    /// Load a URL and wait for the navigation to finish.
    async fn navigate(&mut self, url: &str) -> HarvestResult<()>;
    /// Scroll the window vertically by the given number of pixels.
    async fn scroll_by(&mut self, pixels: i64) -> HarvestResult<()>;
    /// Current `document.body.scrollHeight`.
    async fn scroll_height(&mut self) -> HarvestResult<i64>;
    /// Absolute `href` of every anchor currently in the DOM.
    async fn anchor_hrefs(&mut self) -> HarvestResult<Vec<String>>;
    /// Capture the rendered page.
    async fn snapshot(&mut self) -> HarvestResult<PageSnapshot>;
}

/// Rendered HTML of a page plus its visible body text.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub body_text: String,
}

impl PageSnapshot {
    /// Snapshot with body text supplied by the browser (`innerText`).
    pub fn new(url: impl Into<String>, html: impl Into<String>, body_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            body_text: body_text.into(),
        }
    }

    /// Snapshot whose body text is derived from the HTML itself.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        let body_text = visible_text(&Html::parse_document(&html));
        Self {
            url: url.into(),
            html,
            body_text,
        }
    }
}

/// Text content of `<body>`, skipping script-like elements, one line per
/// non-empty text node.
pub fn visible_text(document: &Html) -> String {
    let Ok(body_sel) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_sel).next() else {
        return String::new();
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines.join("\n")
}

/// Concatenated direct text children of an element.
pub(crate) fn own_text(el: &ElementRef<'_>) -> String {
    el.children()
        .filter_map(|c| c.value().as_text().map(|t| String::from(&**t)))
        .collect()
}

/// Full text of an element with whitespace runs collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
