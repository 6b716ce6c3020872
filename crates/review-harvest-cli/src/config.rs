//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use review_harvest::annotate::AnnotatorSettings;
use review_harvest::dataset::{SAMPLE_SEED, SAMPLE_SIZE};
use review_harvest::{ExtractionProfile, HarvestError, HarvestResult, ScrapeSettings};

use crate::gigachat::GigaChatSettings;
use crate::renderer::BrowserSettings;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "REVIEW_HARVEST_CONFIG";
/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "review-harvest.json";
pub const DEFAULT_CREDENTIAL_ENV: &str = "GIGACHAT_AUTH_KEY";

/// Everything a run can be configured with. Every field has a default, so
/// a config file only lists what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub scrape: ScrapeSettings,
    pub profile: ExtractionProfile,
    pub browser: BrowserSettings,
    pub analysis: AnalysisSettings,
    pub annotation: AnnotationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Raw scrape to read; the scrape output when unset.
    pub input: Option<PathBuf>,
    pub clean_output: PathBuf,
    pub sample_output: PathBuf,
    /// Pretty JSON copy of the statistics report.
    pub report_output: Option<PathBuf>,
    pub sample_size: usize,
    pub sample_seed: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            input: None,
            clean_output: PathBuf::from("products_clean.csv"),
            sample_output: PathBuf::from("annotation_sample.csv"),
            report_output: None,
            sample_size: SAMPLE_SIZE,
            sample_seed: SAMPLE_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Sample to annotate; the analysis sample output when unset.
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    /// Env var holding the API authorization key.
    pub credential_env: String,
    pub annotator: AnnotatorSettings,
    pub gigachat: GigaChatSettings,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from("annotations.csv"),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            annotator: AnnotatorSettings::default(),
            gigachat: GigaChatSettings::default(),
        }
    }
}

impl HarvestConfig {
    pub fn analysis_input(&self) -> &Path {
        self.analysis.input.as_deref().unwrap_or(&self.scrape.output)
    }

    pub fn annotation_input(&self) -> &Path {
        self.annotation
            .input
            .as_deref()
            .unwrap_or(&self.analysis.sample_output)
    }
}

/// Resolve the config file path: explicit flag, then `REVIEW_HARVEST_CONFIG`,
/// then `./review-harvest.json` if it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_config_path_in(explicit, std::env::var(CONFIG_ENV).ok(), &cwd)
}

fn resolve_config_path_in(
    explicit: Option<&Path>,
    env_path: Option<String>,
    cwd: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    let local = cwd.join(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

pub fn load_config_file(path: &Path) -> Result<HarvestConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid config {}", path.display()))
}

/// Load the resolved config, or defaults when no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<HarvestConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            tracing::info!("Using config {}", path.display());
            load_config_file(&path)
        }
        None => {
            tracing::debug!("No config file, using defaults");
            Ok(HarvestConfig::default())
        }
    }
}

/// Non-empty value of a credential env var.
pub fn read_credential(var: &str) -> HarvestResult<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(HarvestError::MissingCredential {
            var: var.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = PathBuf::from("explicit.json");

        assert_eq!(
            resolve_config_path_in(Some(&explicit), Some("env.json".into()), dir.path()),
            Some(explicit.clone())
        );
        assert_eq!(
            resolve_config_path_in(None, Some("env.json".into()), dir.path()),
            Some(PathBuf::from("env.json"))
        );
        assert_eq!(resolve_config_path_in(None, None, dir.path()), None);

        let local = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&local, "{}").unwrap();
        assert_eq!(resolve_config_path_in(None, Some("  ".into()), dir.path()), Some(local));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{"scrape": {"max_items": 20, "output": "out/raw.csv"},
                "profile": {"seller_class": "seller-x"},
                "annotation": {"annotator": {"pace_ms": 0}}}"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.scrape.max_items, 20);
        assert_eq!(config.scrape.scroll.max_scrolls, 400);
        assert_eq!(config.profile.seller_class, "seller-x");
        assert_eq!(config.profile.rating_class, "zM_28");
        assert_eq!(config.annotation.annotator.pace_ms, 0);
        assert_eq!(config.annotation.annotator.max_attempts, 3);
        assert_eq!(config.analysis_input(), Path::new("out/raw.csv"));
        assert_eq!(config.annotation_input(), Path::new("annotation_sample.csv"));
    }

    #[test]
    fn test_invalid_config_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn test_missing_credential() {
        let err = read_credential("REVIEW_HARVEST_TEST_UNSET_CREDENTIAL").unwrap_err();
        assert!(matches!(err, HarvestError::MissingCredential { .. }));
        assert!(err.to_string().contains("export REVIEW_HARVEST_TEST_UNSET_CREDENTIAL="));
    }
}
