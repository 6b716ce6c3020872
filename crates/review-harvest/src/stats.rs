//! Descriptive statistics over the cleaned dataset.
//!
//! `StatsReport` carries the fifteen headline numbers plus the aggregates
//! behind the distribution charts, so that a caller can print it, dump it
//! as JSON, or feed it to a plotting tool of its choice.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::dataset::{CleanRecord, Theme};

const TOP_N: usize = 5;
const CHART_TOP_SELLERS: usize = 10;
const PRICE_BINS: usize = 40;
const RATING_BINS: usize = 20;
const REVIEW_LENGTH_BINS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Count {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub label: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram. The last bin is closed on the right.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<Bin>,
}

impl Histogram {
    pub fn build(values: &[f64], bins: usize) -> Self {
        if values.is_empty() || bins == 0 {
            return Self::default();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Degenerate range: widen around the single value.
        let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self {
            bins: counts
                .into_iter()
                .enumerate()
                .map(|(i, count)| Bin {
                    lower: lo + width * i as f64,
                    upper: lo + width * (i + 1) as f64,
                    count,
                })
                .collect(),
        }
    }

    #[cfg(test)]
    fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Five-number summary with linearly interpolated quartiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted(values);
        Some(Self {
            min: *sorted.first()?,
            q1: quantile(&sorted, 0.25)?,
            median: quantile(&sorted, 0.5)?,
            q3: quantile(&sorted, 0.75)?,
            max: *sorted.last()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeBox {
    pub theme: Theme,
    pub price: BoxSummary,
}

/// Aggregates behind the distribution charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub price_histogram: Histogram,
    pub rating_histogram: Histogram,
    pub review_length_histogram: Histogram,
    /// Mean price of the most frequent sellers, in frequency order.
    pub frequent_seller_mean_price: Vec<GroupMean>,
    pub price_by_theme: Vec<ThemeBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub rows: usize,
    pub mean_price: Option<f64>,
    pub median_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub mean_rating: Option<f64>,
    pub top_ratings: Vec<Count>,
    pub with_reviews: usize,
    pub mean_review_length: Option<f64>,
    pub top_seller: Option<String>,
    pub top_sellers: Vec<Count>,
    pub price_rating_correlation: Option<f64>,
    pub theme_counts: Vec<Count>,
    pub reviews_by_year: Vec<Count>,
    pub mean_rating_by_theme: Vec<GroupMean>,
    pub top_sellers_by_mean_price: Vec<GroupMean>,
    pub charts: ChartData,
}

impl StatsReport {
    pub fn compute(records: &[CleanRecord]) -> Self {
        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        let ratings: Vec<f64> = records.iter().map(|r| r.rating).collect();
        let lengths: Vec<f64> = records.iter().map(|r| r.review_length as f64).collect();

        let seller_counts = value_counts(
            records
                .iter()
                .filter(|r| !r.seller.is_empty())
                .map(|r| r.seller.clone()),
        );
        let seller_prices = group_values(
            records
                .iter()
                .filter(|r| !r.seller.is_empty())
                .map(|r| (r.seller.clone(), r.price)),
        );

        let mut by_mean_price: Vec<GroupMean> = seller_prices
            .iter()
            .filter_map(|(seller, values)| {
                Some(GroupMean {
                    label: seller.clone(),
                    mean: mean(values)?,
                })
            })
            .collect();
        by_mean_price.sort_by(|a, b| b.mean.total_cmp(&a.mean).then_with(|| a.label.cmp(&b.label)));
        by_mean_price.truncate(TOP_N);

        let frequent_seller_mean_price = seller_counts
            .iter()
            .take(CHART_TOP_SELLERS)
            .filter_map(|c| {
                Some(GroupMean {
                    label: c.label.clone(),
                    mean: mean(seller_prices.get(&c.label)?)?,
                })
            })
            .collect();

        let theme_counts = value_counts(records.iter().map(|r| r.theme.to_string()));

        let mut reviews_by_year: BTreeMap<i32, usize> = BTreeMap::new();
        for year in records.iter().filter_map(|r| r.review_year) {
            *reviews_by_year.entry(year).or_default() += 1;
        }

        let mean_rating_by_theme = Theme::ALL
            .iter()
            .filter_map(|theme| {
                let values: Vec<f64> = records
                    .iter()
                    .filter(|r| r.theme == *theme)
                    .map(|r| r.rating)
                    .collect();
                Some(GroupMean {
                    label: theme.to_string(),
                    mean: mean(&values)?,
                })
            })
            .collect();

        let price_by_theme = Theme::ALL
            .iter()
            .filter_map(|theme| {
                let values: Vec<f64> = records
                    .iter()
                    .filter(|r| r.theme == *theme)
                    .map(|r| r.price)
                    .collect();
                Some(ThemeBox {
                    theme: *theme,
                    price: BoxSummary::from_values(&values)?,
                })
            })
            .collect();

        let sorted_prices = sorted(&prices);

        Self {
            rows: records.len(),
            mean_price: mean(&prices),
            median_price: quantile(&sorted_prices, 0.5),
            min_price: sorted_prices.first().copied(),
            max_price: sorted_prices.last().copied(),
            mean_rating: mean(&ratings),
            top_ratings: value_counts(ratings.iter().map(|r| r.to_string()))
                .into_iter()
                .take(TOP_N)
                .collect(),
            with_reviews: records.iter().filter(|r| r.has_review).count(),
            mean_review_length: mean(&lengths),
            top_seller: seller_counts.first().map(|c| c.label.clone()),
            top_sellers: seller_counts.iter().take(TOP_N).cloned().collect(),
            price_rating_correlation: pearson(&prices, &ratings),
            theme_counts,
            reviews_by_year: reviews_by_year
                .into_iter()
                .map(|(year, count)| Count {
                    label: year.to_string(),
                    count,
                })
                .collect(),
            mean_rating_by_theme,
            top_sellers_by_mean_price: by_mean_price,
            charts: ChartData {
                price_histogram: Histogram::build(&prices, PRICE_BINS),
                rating_histogram: Histogram::build(&ratings, RATING_BINS),
                review_length_histogram: Histogram::build(&lengths, REVIEW_LENGTH_BINS),
                frequent_seller_mean_price,
                price_by_theme,
            },
        }
    }
}

// ── Helpers ──

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Pearson correlation; `None` with fewer than two points or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// Counts sorted by frequency, ties broken by label.
fn value_counts(labels: impl Iterator<Item = String>) -> Vec<Count> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut counts: Vec<Count> = counts
        .into_iter()
        .map(|(label, count)| Count { label, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    counts
}

fn group_values(pairs: impl Iterator<Item = (String, f64)>) -> HashMap<String, Vec<f64>> {
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    groups
}

// ── Printing ──

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn counts_line(counts: &[Count]) -> String {
    counts
        .iter()
        .map(|c| format!("{}: {}", c.label, c.count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn means_line(means: &[GroupMean]) -> String {
    means
        .iter()
        .map(|m| format!("{}: {:.2}", m.label, m.mean))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {} products", self.rows)?;
        writeln!(f, " 1. Mean price: {}", opt(self.mean_price))?;
        writeln!(f, " 2. Median price: {}", opt(self.median_price))?;
        writeln!(f, " 3. Min price: {}", opt(self.min_price))?;
        writeln!(f, " 4. Max price: {}", opt(self.max_price))?;
        writeln!(f, " 5. Mean rating: {}", opt(self.mean_rating))?;
        writeln!(f, " 6. Most frequent ratings: {}", counts_line(&self.top_ratings))?;
        writeln!(f, " 7. Products with reviews: {}", self.with_reviews)?;
        writeln!(f, " 8. Mean review length: {}", opt(self.mean_review_length))?;
        writeln!(
            f,
            " 9. Most common seller: {}",
            self.top_seller.as_deref().unwrap_or("n/a")
        )?;
        writeln!(f, "10. Top sellers: {}", counts_line(&self.top_sellers))?;
        writeln!(
            f,
            "11. Price/rating correlation: {}",
            opt(self.price_rating_correlation)
        )?;
        writeln!(f, "12. Themes: {}", counts_line(&self.theme_counts))?;
        writeln!(f, "13. First reviews by year: {}", counts_line(&self.reviews_by_year))?;
        writeln!(f, "14. Mean rating by theme: {}", means_line(&self.mean_rating_by_theme))?;
        write!(
            f,
            "15. Sellers with highest mean price: {}",
            means_line(&self.top_sellers_by_mean_price)
        )
    }
}
