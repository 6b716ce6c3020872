//! Environment readiness check.

use std::path::Path;

use anyhow::Result;

use crate::config::{resolve_config_path, HarvestConfig};
use crate::renderer::{find_chromium, CHROMIUM_ENV};

/// Check Chromium, the API credential, and the config file.
pub fn run(config: &HarvestConfig, explicit_config: Option<&Path>) -> Result<bool> {
    println!("review-harvest doctor");
    println!("=====================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = config.browser.chrome_path.clone().or_else(find_chromium);
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install Chrome or set {CHROMIUM_ENV}."),
    }

    let var = &config.annotation.credential_env;
    let credential = std::env::var(var).is_ok_and(|v| !v.trim().is_empty());
    if credential {
        println!("[OK] {var} is set");
    } else {
        println!("[!!] {var} is not set; `annotate` will fail");
    }

    match resolve_config_path(explicit_config) {
        Some(path) => println!("[OK] Config: {}", path.display()),
        None => println!("[--] No config file, using defaults"),
    }

    let raw = config.analysis_input();
    if raw.exists() {
        println!("[OK] Raw scrape present: {}", raw.display());
    } else {
        println!("[--] No raw scrape yet at {}", raw.display());
    }

    println!();
    let ready = chromium.is_some() && credential;
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(ready)
}
