//! Periodic full snapshots of scraped records.
//!
//! Every `every` items the whole record list is written over the output
//! file and the scraper pauses, throttling the request rate. The final
//! write after the loop uses the same layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::table;
use crate::types::{HarvestResult, ProductRecord};

/// Column order of the raw-scrape table.
pub const RAW_COLUMNS: [&str; 8] = [
    "Title",
    "Seller",
    "RawPrice",
    "Rating",
    "FirstReviewDateText",
    "SourceURL",
    "ReviewText",
    "ReviewLength",
];

/// Raw-scrape CSV row.
#[derive(Debug, Serialize)]
struct RawRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Seller")]
    seller: &'a str,
    #[serde(rename = "RawPrice")]
    raw_price: Option<&'a str>,
    #[serde(rename = "Rating")]
    rating: Option<f64>,
    #[serde(rename = "FirstReviewDateText")]
    first_review_date_text: Option<&'a str>,
    #[serde(rename = "SourceURL")]
    source_url: &'a str,
    #[serde(rename = "ReviewText")]
    review_text: Option<&'a str>,
    #[serde(rename = "ReviewLength")]
    review_length: usize,
}

impl<'a> From<&'a ProductRecord> for RawRow<'a> {
    fn from(r: &'a ProductRecord) -> Self {
        Self {
            title: &r.title,
            seller: &r.seller,
            raw_price: r.raw_price.as_deref(),
            rating: r.rating,
            first_review_date_text: r.first_review_date_text.as_deref(),
            source_url: &r.source_url,
            review_text: r.review_text.as_deref(),
            review_length: r.review_length(),
        }
    }
}

/// Write the raw-scrape table, replacing any previous file.
pub fn write_records(path: &Path, records: &[ProductRecord]) -> HarvestResult<()> {
    table::write_table(path, &RAW_COLUMNS, records.iter().map(RawRow::from))
}

/// Checkpoint cadence and throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    /// Items between checkpoints.
    pub every: usize,
    /// Pause after each checkpoint.
    pub pause_ms: u64,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            every: 50,
            pause_ms: 25_000,
        }
    }
}

/// Writes checkpoints of the accumulated records to one output path.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
    settings: CheckpointSettings,
    written: usize,
}

impl CheckpointWriter {
    pub fn new(path: impl Into<PathBuf>, settings: CheckpointSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            written: 0,
        }
    }

    /// Number of checkpoints written so far.
    pub fn checkpoints_written(&self) -> usize {
        self.written
    }

    /// Whether a checkpoint falls before processing item `index`.
    pub fn is_due(&self, index: usize) -> bool {
        self.settings.every > 0 && index > 0 && index % self.settings.every == 0
    }

    /// Write a checkpoint and pause if one is due at `index`.
    pub async fn maybe_checkpoint(
        &mut self,
        index: usize,
        records: &[ProductRecord],
    ) -> HarvestResult<bool> {
        if !self.is_due(index) {
            return Ok(false);
        }
        write_records(&self.path, records)?;
        self.written += 1;
        tracing::info!(
            "Checkpoint: {} records saved to {}, pausing {} ms",
            records.len(),
            self.path.display(),
            self.settings.pause_ms
        );
        tokio::time::sleep(Duration::from_millis(self.settings.pause_ms)).await;
        Ok(true)
    }

    /// Final write after the last item.
    pub fn finish(&self, records: &[ProductRecord]) -> HarvestResult<()> {
        write_records(&self.path, records)?;
        tracing::info!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> ProductRecord {
        ProductRecord {
            title: format!("Phone {i}"),
            seller: "Store".to_string(),
            raw_price: Some("9 990 ₽".to_string()),
            rating: Some(4.5),
            first_review_date_text: Some("7 декабря 2025".to_string()),
            source_url: format!("https://shop.example/product/p-{i}/"),
            review_text: Some("Хороший".to_string()),
        }
    }

    #[test]
    fn test_checkpoint_cadence() {
        let writer = CheckpointWriter::new("out.csv", CheckpointSettings::default());
        assert!(!writer.is_due(0));
        assert!(!writer.is_due(49));
        assert!(writer.is_due(50));
        assert!(!writer.is_due(51));
        assert!(writer.is_due(100));
    }

    #[test]
    fn test_zero_interval_never_due() {
        let writer = CheckpointWriter::new(
            "out.csv",
            CheckpointSettings {
                every: 0,
                pause_ms: 0,
            },
        );
        assert!(!writer.is_due(0));
        assert!(!writer.is_due(10));
    }

    #[tokio::test]
    async fn test_checkpoint_overwrites_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        let mut writer = CheckpointWriter::new(
            &path,
            CheckpointSettings {
                every: 2,
                pause_ms: 0,
            },
        );

        let records: Vec<ProductRecord> = (0..4).map(record).collect();
        assert!(!writer.maybe_checkpoint(1, &records[..1]).await.unwrap());
        assert!(writer.maybe_checkpoint(2, &records[..2]).await.unwrap());
        assert!(writer.maybe_checkpoint(4, &records[..4]).await.unwrap());
        assert_eq!(writer.checkpoints_written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let content = content.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Title,Seller,RawPrice,Rating,FirstReviewDateText,SourceURL,ReviewText,ReviewLength"
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[1].ends_with(",Хороший,7"));
    }

    #[test]
    fn test_absent_fields_written_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        let rec = ProductRecord {
            raw_price: None,
            rating: None,
            first_review_date_text: None,
            review_text: None,
            ..record(1)
        };
        write_records(&path, &[rec]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("Phone 1,Store,,,,https://shop.example/product/p-1/,,0\n"));
    }
}
