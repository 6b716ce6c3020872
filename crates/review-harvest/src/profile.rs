//! Site-specific extraction vocabulary.
//!
//! Class tokens, labels, URL fragments and placeholder values that tie the
//! extractor to one marketplace layout. Defaults target a Russian-language
//! marketplace; every field can be overridden from the config file.

use serde::{Deserialize, Serialize};

/// Genitive month names as they appear in review dates ("7 декабря 2025").
pub const RUSSIAN_MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Extraction vocabulary for one marketplace layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionProfile {
    /// Selector for the product title element.
    pub title_selector: String,
    /// Value used when no title element exists.
    pub title_placeholder: String,
    /// Class token carried by the seller name element.
    pub seller_class: String,
    /// Label of the "go to store" control that follows the seller name.
    pub store_label: String,
    /// Value used when no seller strategy matches.
    pub seller_fallback: String,
    /// Currency glyph identifying the price element.
    pub currency_glyph: String,
    /// Class token carried by the "x / 5" rating element.
    pub rating_class: String,
    /// Month names in calendar order, as used in review dates.
    pub months: Vec<String>,
    /// Review snippets must be longer than this many characters.
    pub min_review_chars: usize,
    /// Maximum number of review snippets kept per product.
    pub max_review_snippets: usize,
    pub review_separator: String,
    /// Path fragment every product link contains.
    pub product_path: String,
    /// Path fragment identifying review pages (excluded from collection).
    pub reviews_path: String,
    /// Appended to a product URL to reach its reviews page.
    pub reviews_suffix: String,
    /// Review text the site shows for products without reviews.
    pub no_reviews_text: String,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self {
            title_selector: "h1".to_string(),
            title_placeholder: "Название не найдено".to_string(),
            seller_class: "b35_3_16".to_string(),
            store_label: "Перейти".to_string(),
            seller_fallback: "Не найден".to_string(),
            currency_glyph: "₽".to_string(),
            rating_class: "zM_28".to_string(),
            months: RUSSIAN_MONTHS_GENITIVE
                .iter()
                .map(|m| m.to_string())
                .collect(),
            min_review_chars: 40,
            max_review_snippets: 3,
            review_separator: " || ".to_string(),
            product_path: "/product/".to_string(),
            reviews_path: "/reviews/".to_string(),
            reviews_suffix: "reviews/".to_string(),
            no_reviews_text: "Отзывы не найдены.".to_string(),
        }
    }
}

impl ExtractionProfile {
    /// Month number (1–12) for a month name, case-insensitive.
    pub fn month_number(&self, name: &str) -> Option<u32> {
        let needle = name.trim().to_lowercase();
        self.months
            .iter()
            .position(|m| m.to_lowercase() == needle)
            .map(|i| i as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_number_lookup() {
        let profile = ExtractionProfile::default();
        assert_eq!(profile.month_number("января"), Some(1));
        assert_eq!(profile.month_number("Декабря"), Some(12));
        assert_eq!(profile.month_number("december"), None);
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let profile: ExtractionProfile =
            serde_json::from_str(r#"{"seller_class": "seller-name"}"#).unwrap();
        assert_eq!(profile.seller_class, "seller-name");
        assert_eq!(profile.rating_class, "zM_28");
        assert_eq!(profile.months.len(), 12);
    }
}
