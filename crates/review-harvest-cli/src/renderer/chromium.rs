//! Chromium-backed `BrowserPage` using chromiumoxide.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use review_harvest::{BrowserPage, HarvestError, HarvestResult, PageSnapshot};

use super::{find_chromium, BrowserSettings};

const ANCHORS_JS: &str = "Array.from(document.querySelectorAll('a[href]'), a => a.href)";
const HEIGHT_JS: &str = "document.body.scrollHeight";
const HTML_JS: &str = "document.documentElement.outerHTML";
const TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// A launched Chromium process and its CDP event loop.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    nav_timeout: Duration,
}

impl ChromiumBrowser {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let chrome_path = match &settings.chrome_path {
            Some(path) => path.clone(),
            None => find_chromium().with_context(|| {
                format!(
                    "Chromium not found. Install Chrome or set {}",
                    super::CHROMIUM_ENV
                )
            })?,
        };
        tracing::info!("Launching Chromium from {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.window_width, settings.window_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ua) = &settings.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            nav_timeout: Duration::from_millis(settings.nav_timeout_ms),
        })
    }

    pub async fn new_page(&self) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumPage {
            page,
            nav_timeout: self.nav_timeout,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .context("failed to close Chromium")?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Page,
    nav_timeout: Duration,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> HarvestResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| HarvestError::Browser(format!("JS execution failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| HarvestError::Browser(format!("failed to convert JS result: {e:?}")))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        let navigation = tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await;
        match navigation {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {}ms", self.nav_timeout.as_millis()),
            }),
        }
    }

    async fn scroll_by(&mut self, pixels: i64) -> HarvestResult<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {pixels})"))
            .await
            .map_err(|e| HarvestError::Browser(format!("scroll failed: {e}")))?;
        Ok(())
    }

    async fn scroll_height(&mut self) -> HarvestResult<i64> {
        self.eval(HEIGHT_JS).await
    }

    async fn anchor_hrefs(&mut self) -> HarvestResult<Vec<String>> {
        self.eval(ANCHORS_JS).await
    }

    async fn snapshot(&mut self) -> HarvestResult<PageSnapshot> {
        let html: String = self.eval(HTML_JS).await?;
        let body_text: String = self.eval(TEXT_JS).await?;
        let url = self
            .page
            .url()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to get URL: {e}")))?
            .unwrap_or_default();
        Ok(PageSnapshot::new(url, html, body_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium
    async fn test_chromium_page_scroll_and_snapshot() {
        let settings = BrowserSettings {
            headless: true,
            ..BrowserSettings::default()
        };
        let browser = ChromiumBrowser::launch(&settings).await.unwrap();
        let mut page = browser.new_page().await.unwrap();

        page.navigate("data:text/html,<html><body><a href='/product/x/'>x</a><p>4,5 / 5</p></body></html>")
            .await
            .unwrap();
        page.scroll_by(2500).await.unwrap();
        assert!(page.scroll_height().await.unwrap() >= 0);
        assert_eq!(page.anchor_hrefs().await.unwrap().len(), 1);

        let snapshot = page.snapshot().await.unwrap();
        assert!(snapshot.body_text.contains("4,5 / 5"));

        browser.close().await.unwrap();
    }
}
