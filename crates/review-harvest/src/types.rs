//! Core data types shared by the scrape, cleaning and annotation stages.

use serde::{Deserialize, Serialize};

/// One scraped product: card fields plus the first page of its reviews.
///
/// Built once per successfully processed URL and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub seller: String,
    pub raw_price: Option<String>,
    /// Average rating on a 0–5 scale.
    pub rating: Option<f64>,
    /// Free-form localized date, e.g. "7 декабря 2025".
    pub first_review_date_text: Option<String>,
    /// Normalized product URL, the record's unique key.
    pub source_url: String,
    /// Up to three review snippets joined by a fixed separator.
    pub review_text: Option<String>,
}

impl ProductRecord {
    /// Character count of the review text (0 when absent).
    pub fn review_length(&self) -> usize {
        self.review_text
            .as_deref()
            .map(|t| t.chars().count())
            .unwrap_or(0)
    }
}

/// Overall tone of a review as judged by the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Case-insensitive parse of a model-provided label.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured annotation of a single review.
///
/// Every structured field is `None` when the model reply could not be used;
/// `summary` then carries a diagnostic (the cleaned or raw reply, or a
/// network-error marker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub review_text: String,
    pub sentiment: Option<Sentiment>,
    pub emotions: Option<Vec<String>>,
    pub topics: Option<Vec<String>>,
    /// Review quality on a 1–10 scale.
    pub quality: Option<u8>,
    pub summary: String,
}

impl AnnotationRecord {
    /// A record with no structured fields and the given diagnostic summary.
    pub fn degraded(review_text: &str, summary: impl Into<String>) -> Self {
        Self {
            review_text: review_text.to_string(),
            sentiment: None,
            emotions: None,
            topics: None,
            quality: None,
            summary: summary.into(),
        }
    }

    /// Whether any structured field was filled.
    pub fn is_structured(&self) -> bool {
        self.sentiment.is_some()
            || self.emotions.is_some()
            || self.topics.is_some()
            || self.quality.is_some()
    }
}

/// Errors that can occur in the harvest library.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Column '{column}' is missing from {path}")]
    MissingColumn { column: String, path: String },

    #[error(
        "Environment variable {var} is not set. Export the API credential before running, \
         e.g. `export {var}=<token>` (PowerShell: `setx {var} \"<token>\"`)"
    )]
    MissingCredential { var: String },

    /// Transport-level failure talking to the chat API; safe to retry.
    #[error("Chat request failed: {0}")]
    Chat(String),

    /// The chat API answered but the reply had no usable message content.
    #[error("Chat reply had no message content: {0}")]
    MalformedReply(String),
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_length_counts_chars() {
        let mut record = ProductRecord {
            title: "Смартфон".to_string(),
            seller: "Магазин".to_string(),
            raw_price: None,
            rating: None,
            first_review_date_text: None,
            source_url: "https://shop.example/product/1/".to_string(),
            review_text: Some("Отлично".to_string()),
        };
        assert_eq!(record.review_length(), 7);
        record.review_text = None;
        assert_eq!(record.review_length(), 0);
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!(Sentiment::parse(" Positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("mixed"), None);
        assert_eq!(Sentiment::Neutral.to_string(), "neutral");
    }

    #[test]
    fn test_degraded_record_is_unstructured() {
        let rec = AnnotationRecord::degraded("text", "oops");
        assert!(!rec.is_structured());
        assert_eq!(rec.summary, "oops");
    }

    #[test]
    fn test_missing_credential_message_names_variable() {
        let err = HarvestError::MissingCredential {
            var: "GIGACHAT_AUTH_KEY".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("GIGACHAT_AUTH_KEY"));
        assert!(msg.contains("export"));
    }
}
