//! Browser launch settings and Chromium discovery.

pub mod chromium;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use chromium::{ChromiumBrowser, ChromiumPage};

/// Env var pointing at a specific Chromium binary.
pub const CHROMIUM_ENV: &str = "REVIEW_HARVEST_CHROMIUM_PATH";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window. Storefronts tend to block headless
    /// sessions, so this is off unless asked for.
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Explicit binary; skips discovery when set.
    pub chrome_path: Option<PathBuf>,
    pub nav_timeout_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            chrome_path: None,
            nav_timeout_ms: 60_000,
            window_width: 1366,
            window_height: 900,
        }
    }
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. REVIEW_HARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.review-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let base = home.join(".review-harvest/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                base.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome"),
            ]
        } else if cfg!(target_os = "windows") {
            vec![base.join("chrome-win64/chrome.exe"), base.join("chrome.exe")]
        } else {
            vec![base.join("chrome-linux64/chrome"), base.join("chrome")]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common install locations
    let common = if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ]
    } else {
        Vec::new()
    };
    common.into_iter().find(|p| p.exists())
}
