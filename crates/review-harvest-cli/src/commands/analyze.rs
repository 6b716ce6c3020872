//! `review-harvest analyze`: clean the raw scrape, print statistics, and
//! draw the annotation sample.

use anyhow::{Context, Result};

use review_harvest::dataset;
use review_harvest::StatsReport;

use crate::config::HarvestConfig;

pub fn run(config: &HarvestConfig) -> Result<StatsReport> {
    let input = config.analysis_input();
    let settings = &config.analysis;

    let rows = dataset::read_raw(input)
        .with_context(|| format!("failed to read raw scrape {}", input.display()))?;
    let cleaned = dataset::clean_records(&rows, &config.profile);
    dataset::write_clean(&settings.clean_output, &cleaned).with_context(|| {
        format!(
            "failed to write cleaned dataset {}",
            settings.clean_output.display()
        )
    })?;

    let report = StatsReport::compute(&cleaned);
    println!("{report}");

    if let Some(path) = &settings.report_output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    let sample =
        dataset::sample_for_annotation(&cleaned, settings.sample_size, settings.sample_seed);
    dataset::write_sample(&settings.sample_output, &sample).with_context(|| {
        format!(
            "failed to write annotation sample {}",
            settings.sample_output.display()
        )
    })?;

    println!(
        "\nCleaned {} of {} rows -> {}; sample of {} -> {}",
        cleaned.len(),
        rows.len(),
        settings.clean_output.display(),
        sample.len(),
        settings.sample_output.display()
    );
    Ok(report)
}
