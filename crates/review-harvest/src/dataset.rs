//! Cleaning of the raw scrape into an analysis-ready dataset, plus the
//! seeded sample handed to the annotator.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::links::normalize_url;
use crate::profile::ExtractionProfile;
use crate::table;
use crate::types::HarvestResult;

/// Rows drawn for annotation when the dataset is large enough.
pub const SAMPLE_SIZE: usize = 200;
/// Seed of the annotation sample.
pub const SAMPLE_SEED: u64 = 42;

/// Raw columns kept verbatim, with parsed and derived columns alongside.
pub const CLEAN_COLUMNS: [&str; 15] = [
    "Title",
    "Seller",
    "RawPrice",
    "Price",
    "Rating",
    "FirstReviewDateText",
    "FirstReviewDate",
    "SourceURL",
    "ReviewText",
    "ReviewLength",
    "HasReview",
    "PriceLog",
    "RatingGroup",
    "ReviewYear",
    "Theme",
];

pub const SAMPLE_COLUMNS: [&str; 3] = ["ReviewText", "Theme", "Rating"];

// ── Derived labels ──

/// Coarse rating bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingGroup {
    /// [0, 3]
    Poor,
    /// (3, 4]
    Average,
    /// (4, 4.5]
    Good,
    /// (4.5, 5]
    Excellent,
}

impl RatingGroup {
    pub fn from_rating(rating: f64) -> Option<Self> {
        if !(0.0..=5.0).contains(&rating) {
            return None;
        }
        Some(if rating <= 3.0 {
            Self::Poor
        } else if rating <= 4.0 {
            Self::Average
        } else if rating <= 4.5 {
            Self::Good
        } else {
            Self::Excellent
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Average => "average",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl fmt::Display for RatingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a review mostly talks about, by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Camera,
    Battery,
    Screen,
    Performance,
    Other,
}

const THEME_KEYWORDS: [(Theme, &[&str]); 4] = [
    (Theme::Camera, &["камера", "фото", "видео"]),
    (Theme::Battery, &["батаре", "аккумуля"]),
    (Theme::Screen, &["экран", "дисплей"]),
    (Theme::Performance, &["скорост", "быстр", "лаг"]),
];

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Camera,
        Theme::Battery,
        Theme::Screen,
        Theme::Performance,
        Theme::Other,
    ];

    /// First theme whose keyword occurs in the lowercased text.
    pub fn detect(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Self::Other;
        };
        let lowered = text.to_lowercase();
        THEME_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
            .map(|(theme, _)| *theme)
            .unwrap_or(Self::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Battery => "battery",
            Self::Screen => "screen",
            Self::Performance => "performance",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Field parsing ──

/// Integer roubles from a displayed price such as `"12 990 ₽"`.
///
/// Any whitespace (no-break and thin spaces included) is removed before
/// the first digit run is taken.
pub fn parse_price(raw: &str, currency_glyph: &str) -> Option<f64> {
    let compact: String = raw
        .replace(currency_glyph, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let digits: String = compact
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(|v| v as f64)
}

/// Numeric rating in 0–5; comma decimals accepted.
pub fn parse_rating_cell(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    (value.is_finite() && (0.0..=5.0).contains(&value)).then_some(value)
}

/// `"7 декабря 2025"` → 2025-12-07.
pub fn parse_review_date(text: &str, profile: &ExtractionProfile) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = tokens.as_slice() else {
        return None;
    };
    let day: u32 = day.parse().ok()?;
    let month = profile.month_number(month)?;
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

// ── Records ──

/// Raw-scrape row as read back from disk. Every cell is optional so that
/// hand-edited or older files still load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Seller")]
    pub seller: Option<String>,
    #[serde(rename = "RawPrice")]
    pub raw_price: Option<String>,
    #[serde(rename = "Rating")]
    pub rating: Option<String>,
    #[serde(rename = "FirstReviewDateText")]
    pub first_review_date_text: Option<String>,
    #[serde(rename = "SourceURL")]
    pub source_url: Option<String>,
    #[serde(rename = "ReviewText")]
    pub review_text: Option<String>,
    #[serde(rename = "ReviewLength")]
    pub review_length: Option<String>,
}

/// A product row that survived cleaning, with derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Seller")]
    pub seller: String,
    #[serde(rename = "RawPrice")]
    pub raw_price: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Rating")]
    pub rating: f64,
    /// Date text as scraped, kept even when it does not parse.
    #[serde(rename = "FirstReviewDateText")]
    pub first_review_date_text: Option<String>,
    #[serde(rename = "FirstReviewDate")]
    pub first_review_date: Option<NaiveDate>,
    #[serde(rename = "SourceURL")]
    pub source_url: String,
    #[serde(rename = "ReviewText")]
    pub review_text: Option<String>,
    #[serde(rename = "ReviewLength")]
    pub review_length: usize,
    #[serde(rename = "HasReview")]
    pub has_review: bool,
    #[serde(rename = "PriceLog")]
    pub price_log: f64,
    #[serde(rename = "RatingGroup")]
    pub rating_group: Option<RatingGroup>,
    #[serde(rename = "ReviewYear")]
    pub review_year: Option<i32>,
    #[serde(rename = "Theme")]
    pub theme: Theme,
}

pub fn read_raw(path: &Path) -> HarvestResult<Vec<RawRow>> {
    table::read_table(path)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Clean raw rows: parse, de-duplicate by normalized URL (first wins),
/// drop rows lacking a title, price or rating, derive the extra columns.
pub fn clean_records(rows: &[RawRow], profile: &ExtractionProfile) -> Vec<CleanRecord> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    let mut duplicates = 0usize;
    let mut incomplete = 0usize;

    for row in rows {
        let url = non_empty(&row.source_url).map(normalize_url).unwrap_or_default();
        if !seen.insert(url.clone()) {
            duplicates += 1;
            continue;
        }

        let title = non_empty(&row.title);
        let raw_price = non_empty(&row.raw_price);
        let price = raw_price.and_then(|p| parse_price(p, &profile.currency_glyph));
        let rating = non_empty(&row.rating).and_then(parse_rating_cell);
        let (Some(title), Some(raw_price), Some(price), Some(rating)) =
            (title, raw_price, price, rating)
        else {
            incomplete += 1;
            continue;
        };

        let review_text = row.review_text.clone().filter(|t| !t.trim().is_empty());
        let review_length = non_empty(&row.review_length)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(|| review_text.as_deref().map_or(0, |t| t.chars().count()));
        let has_review = review_text
            .as_deref()
            .is_some_and(|t| t.trim() != profile.no_reviews_text);
        let first_review_date_text = non_empty(&row.first_review_date_text);
        let first_review_date =
            first_review_date_text.and_then(|t| parse_review_date(t, profile));

        cleaned.push(CleanRecord {
            title: title.to_string(),
            seller: non_empty(&row.seller).unwrap_or_default().to_string(),
            raw_price: raw_price.to_string(),
            price,
            rating,
            first_review_date_text: first_review_date_text.map(String::from),
            first_review_date,
            source_url: url,
            theme: Theme::detect(review_text.as_deref()),
            review_text,
            review_length,
            has_review,
            price_log: price.ln_1p(),
            rating_group: RatingGroup::from_rating(rating),
            review_year: first_review_date.map(|d| d.year()),
        });
    }

    tracing::info!(
        "Cleaned {} rows: {} kept, {} duplicates, {} incomplete",
        rows.len(),
        cleaned.len(),
        duplicates,
        incomplete
    );
    cleaned
}

pub fn write_clean(path: &Path, records: &[CleanRecord]) -> HarvestResult<()> {
    table::write_table(path, &CLEAN_COLUMNS, records)
}

// ── Annotation sample ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    #[serde(rename = "ReviewText")]
    pub review_text: Option<String>,
    #[serde(rename = "Theme")]
    pub theme: Theme,
    #[serde(rename = "Rating")]
    pub rating: f64,
}

/// Draw `min(size, n)` records without replacement, reproducibly.
pub fn sample_for_annotation(records: &[CleanRecord], size: usize, seed: u64) -> Vec<SampleRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    records
        .choose_multiple(&mut rng, size.min(records.len()))
        .map(|r| SampleRow {
            review_text: r.review_text.clone(),
            theme: r.theme,
            rating: r.rating,
        })
        .collect()
}

pub fn write_sample(path: &Path, rows: &[SampleRow]) -> HarvestResult<()> {
    table::write_table(path, &SAMPLE_COLUMNS, rows)
}
