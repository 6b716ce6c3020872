//! Review annotation through a chat-completion model.
//!
//! Each review is sent with a fixed prompt asking for a strict JSON object.
//! Models routinely wrap that object in code fences or chatter, so replies
//! go through a lenient cleanup stage before parsing, and every failure mode
//! degrades into a record whose `summary` says what went wrong.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table;
use crate::types::{AnnotationRecord, HarvestError, HarvestResult, Sentiment};

/// Summary of a record whose request never got through.
pub const NETWORK_ERROR_SUMMARY: &str = "Ошибка сети";

pub const REVIEW_COLUMN: &str = "ReviewText";

pub const ANNOTATION_COLUMNS: [&str; 6] = [
    "ReviewText",
    "Sentiment",
    "Emotions",
    "Topics",
    "Quality",
    "Summary",
];

const LIST_SEPARATOR: &str = "; ";

/// Anything that turns a prompt into the model's reply text.
///
/// Implementations return `HarvestError::Chat` for transport failures
/// (retried) and `HarvestError::MalformedReply` carrying the raw response
/// body when the API answered without message content (not retried).
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> HarvestResult<String>;
}

/// Fixed instruction asking for one JSON object about `review`.
pub fn build_prompt(review: &str) -> String {
    format!(
        "Ты анализируешь отзывы покупателей. Прочитай отзыв и ответь ТОЛЬКО JSON-объектом \
         без пояснений:\n\n\
         {{\n  \"sentiment\": \"positive | neutral | negative\",\n  \
         \"emotions\": [\"эмоция\"],\n  \"topics\": [\"тема\"],\n  \
         \"quality\": <целое от 1 до 10>,\n  \"summary\": \"одно предложение\"\n}}\n\n\
         Отзыв:\n\"\"\"{review}\"\"\"\n"
    )
}

// ── Reply parsing ──

/// Strip code fences and a leading `json` language tag.
pub fn clean_reply(raw: &str) -> String {
    let without_fences = raw.replace("```json", "").replace("```", "");
    let trimmed = without_fences.trim();
    let untagged = match trimmed.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &trimmed[4..],
        _ => trimmed,
    };
    untagged.trim().to_string()
}

/// Turn a model reply into a record, never failing.
///
/// No `{`…`}` span → summary is the cleaned text. A span that is not a
/// JSON object → summary is the raw reply.
pub fn parse_reply(review_text: &str, raw: &str) -> AnnotationRecord {
    let cleaned = clean_reply(raw);
    let span = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => return AnnotationRecord::degraded(review_text, cleaned),
    };

    let object = match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::debug!("Reply is not a JSON object: {raw}");
            return AnnotationRecord::degraded(review_text, raw);
        }
    };

    AnnotationRecord {
        review_text: review_text.to_string(),
        sentiment: object
            .get("sentiment")
            .and_then(Value::as_str)
            .and_then(Sentiment::parse),
        emotions: object.get("emotions").and_then(coerce_list),
        topics: object.get("topics").and_then(coerce_list),
        quality: object.get("quality").and_then(coerce_quality),
        summary: match object.get("summary") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
    }
}

/// A list of labels, or a single label promoted to a one-item list.
fn coerce_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

/// Integer, float or numeric string within 1–10.
fn coerce_quality(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    let rounded = number.round();
    (1.0..=10.0).contains(&rounded).then_some(rounded as u8)
}

// ── Annotator ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorSettings {
    /// Attempts per review before giving up on the network.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause between consecutive reviews.
    pub pace_ms: u64,
    /// Reviews read from the sample file.
    pub max_reviews: usize,
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            pace_ms: 1000,
            max_reviews: 200,
        }
    }
}

pub struct Annotator<'a, C: ChatClient + ?Sized> {
    client: &'a C,
    settings: AnnotatorSettings,
}

impl<'a, C: ChatClient + ?Sized> Annotator<'a, C> {
    pub fn new(client: &'a C, settings: AnnotatorSettings) -> Self {
        Self { client, settings }
    }

    /// Annotate one review with retries on transport failure.
    pub async fn annotate_one(&self, review: &str) -> AnnotationRecord {
        let prompt = build_prompt(review);
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.client.complete(&prompt).await {
                Ok(reply) => return parse_reply(review, &reply),
                Err(HarvestError::MalformedReply(body)) => {
                    tracing::warn!("Reply without content, keeping raw body");
                    return AnnotationRecord::degraded(review, body);
                }
                Err(e) => {
                    tracing::warn!("Chat attempt {attempt}/{max_attempts} failed: {e}");
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms))
                            .await;
                    }
                }
            }
        }

        AnnotationRecord::degraded(review, NETWORK_ERROR_SUMMARY)
    }

    /// Annotate every review in order, pacing requests.
    pub async fn annotate_all(&self, reviews: &[String]) -> Vec<AnnotationRecord> {
        let mut records = Vec::with_capacity(reviews.len());
        for (idx, review) in reviews.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.pace_ms)).await;
            }
            let record = self.annotate_one(review).await;
            tracing::info!(
                "[{}/{}] sentiment={} quality={:?}",
                idx + 1,
                reviews.len(),
                record.sentiment.map_or("-", |s| s.as_str()),
                record.quality
            );
            records.push(record);
        }
        records
    }
}

// ── Files ──

#[derive(Debug, Deserialize)]
struct ReviewRow {
    #[serde(rename = "ReviewText")]
    review_text: Option<String>,
}

/// Review texts from the sample file, at most `limit` of them.
pub fn read_review_texts(path: &Path, limit: usize) -> HarvestResult<Vec<String>> {
    table::require_columns(path, &[REVIEW_COLUMN])?;
    let rows: Vec<ReviewRow> = table::read_table(path)?;
    Ok(rows
        .into_iter()
        .take(limit)
        .map(|r| r.review_text.unwrap_or_default())
        .collect())
}

#[derive(Debug, Serialize)]
struct AnnotationRow<'a> {
    #[serde(rename = "ReviewText")]
    review_text: &'a str,
    #[serde(rename = "Sentiment")]
    sentiment: Option<&'static str>,
    #[serde(rename = "Emotions")]
    emotions: Option<String>,
    #[serde(rename = "Topics")]
    topics: Option<String>,
    #[serde(rename = "Quality")]
    quality: Option<u8>,
    #[serde(rename = "Summary")]
    summary: &'a str,
}

impl<'a> From<&'a AnnotationRecord> for AnnotationRow<'a> {
    fn from(r: &'a AnnotationRecord) -> Self {
        Self {
            review_text: &r.review_text,
            sentiment: r.sentiment.map(|s| s.as_str()),
            emotions: r.emotions.as_ref().map(|v| v.join(LIST_SEPARATOR)),
            topics: r.topics.as_ref().map(|v| v.join(LIST_SEPARATOR)),
            quality: r.quality,
            summary: &r.summary,
        }
    }
}

pub fn write_annotations(path: &Path, records: &[AnnotationRecord]) -> HarvestResult<()> {
    table::write_table(path, &ANNOTATION_COLUMNS, records.iter().map(AnnotationRow::from))
}
