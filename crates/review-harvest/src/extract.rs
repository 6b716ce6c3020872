//! Best-effort field extraction from product and review page snapshots.
//!
//! Each field owns an ordered list of strategies. A strategy is a plain
//! function from a parsed page to `Option<T>`; `None` means "element or
//! pattern not found" and hands over to the next strategy. Nothing in here
//! returns an error once the extractor has been built: a page that matches
//! nothing simply yields absent fields.
//!
//! Like the rest of the `scraper`-based code, extraction is synchronous and
//! the parsed document never crosses an `.await`.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::page::{element_text, own_text, PageSnapshot};
use crate::profile::ExtractionProfile;
use crate::types::{HarvestError, HarvestResult};

/// `4,5 / 5`, `4.8/5`, `5 / 5`.
const RATING_PATTERN: &str = r"(\d+[.,]?\d*)\s*/\s*5";

/// Title and seller, read from the product card page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPageFields {
    pub title: String,
    pub seller: String,
}

/// Fields read from a product's reviews page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPageFields {
    pub review_text: Option<String>,
    pub rating: Option<f64>,
    pub first_review_date_text: Option<String>,
    pub raw_price: Option<String>,
}

/// A parsed snapshot handed to strategies.
struct ParsedPage<'a> {
    document: Html,
    body_text: &'a str,
}

type StrategyFn<T> = fn(&ParsedPage<'_>, &PageExtractor) -> Option<T>;

/// One named way of finding a field.
struct Strategy<T> {
    name: &'static str,
    run: StrategyFn<T>,
}

const SELLER_STRATEGIES: &[Strategy<String>] = &[
    Strategy {
        name: "seller-class",
        run: seller_by_class,
    },
    Strategy {
        name: "store-label-sibling",
        run: seller_before_store_label,
    },
];

const PRICE_STRATEGIES: &[Strategy<String>] = &[Strategy {
    name: "currency-span",
    run: price_by_currency,
}];

const RATING_STRATEGIES: &[Strategy<f64>] = &[
    Strategy {
        name: "rating-class",
        run: rating_by_class,
    },
    Strategy {
        name: "body-text",
        run: rating_in_body,
    },
];

const DATE_STRATEGIES: &[Strategy<String>] = &[Strategy {
    name: "body-date",
    run: date_in_body,
}];

const REVIEW_STRATEGIES: &[Strategy<String>] = &[Strategy {
    name: "long-spans",
    run: review_snippets,
}];

/// Run strategies in order and return the first hit.
fn first_hit<T>(
    field: &str,
    strategies: &[Strategy<T>],
    page: &ParsedPage<'_>,
    extractor: &PageExtractor,
) -> Option<T> {
    for strategy in strategies {
        if let Some(value) = (strategy.run)(page, extractor) {
            tracing::debug!("{field}: resolved by '{}'", strategy.name);
            return Some(value);
        }
    }
    tracing::debug!("{field}: no strategy matched");
    None
}

/// Compiled selectors and patterns for one `ExtractionProfile`.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    profile: ExtractionProfile,
    title: Selector,
    span: Selector,
    seller_class: Selector,
    rating_class: Selector,
    review_span: Selector,
    rating_re: Regex,
    date_re: Regex,
}

impl PageExtractor {
    /// Compile a profile. Fails only on selectors or month names that do
    /// not form valid patterns.
    pub fn new(profile: ExtractionProfile) -> HarvestResult<Self> {
        if profile.months.len() != 12 {
            return Err(HarvestError::Config(format!(
                "expected 12 month names, got {}",
                profile.months.len()
            )));
        }

        let months = profile
            .months
            .iter()
            .map(|m| regex::escape(m))
            .collect::<Vec<_>>()
            .join("|");
        let date_re = Regex::new(&format!(r"(?i)\b\d{{1,2}}\s+(?:{months})\s+\d{{4}}\b"))?;

        Ok(Self {
            title: parse_selector(&profile.title_selector)?,
            span: parse_selector("span")?,
            seller_class: parse_selector(&class_selector(&profile.seller_class))?,
            rating_class: parse_selector(&class_selector(&profile.rating_class))?,
            review_span: parse_selector("div span")?,
            rating_re: Regex::new(RATING_PATTERN)?,
            date_re,
            profile,
        })
    }

    pub fn profile(&self) -> &ExtractionProfile {
        &self.profile
    }

    /// Title and seller from a product card page.
    pub fn product_fields(&self, snapshot: &PageSnapshot) -> ProductPageFields {
        let page = self.parse(snapshot);

        let title = page
            .document
            .select(&self.title)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.profile.title_placeholder.clone());

        let seller = first_hit("seller", SELLER_STRATEGIES, &page, self)
            .unwrap_or_else(|| self.profile.seller_fallback.clone());

        ProductPageFields { title, seller }
    }

    /// Review text, rating, first review date and price from a reviews page.
    ///
    /// The four fields are resolved independently.
    pub fn review_fields(&self, snapshot: &PageSnapshot) -> ReviewPageFields {
        let page = self.parse(snapshot);
        ReviewPageFields {
            raw_price: first_hit("price", PRICE_STRATEGIES, &page, self),
            rating: first_hit("rating", RATING_STRATEGIES, &page, self),
            first_review_date_text: first_hit("first_review_date", DATE_STRATEGIES, &page, self),
            review_text: first_hit("review_text", REVIEW_STRATEGIES, &page, self),
        }
    }

    /// Parse the first `x / 5` rating in a text (comma decimals accepted).
    pub fn parse_rating(&self, text: &str) -> Option<f64> {
        let caps = self.rating_re.captures(text)?;
        let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
        (0.0..=5.0).contains(&value).then_some(value)
    }

    /// First `<day> <month> <year>` substring in document order.
    pub fn find_review_date(&self, text: &str) -> Option<String> {
        self.date_re.find(text).map(|m| m.as_str().to_string())
    }

    fn parse<'a>(&self, snapshot: &'a PageSnapshot) -> ParsedPage<'a> {
        ParsedPage {
            document: Html::parse_document(&snapshot.html),
            body_text: &snapshot.body_text,
        }
    }
}

fn class_selector(token: &str) -> String {
    format!(r#"[class*="{token}"]"#)
}

fn parse_selector(selector: &str) -> HarvestResult<Selector> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ── Seller ──

fn seller_by_class(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<String> {
    page.document
        .select(&ex.seller_class)
        .find(|el| own_text(el).trim().chars().count() > 3)
        .and_then(|el| non_empty(element_text(&el)))
}

/// The span right before the "go to store" label, in document order.
/// Ancestors of the label are not "preceding" and are skipped.
fn seller_before_store_label(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<String> {
    let spans: Vec<ElementRef<'_>> = page.document.select(&ex.span).collect();
    let label_idx = spans
        .iter()
        .position(|s| own_text(s).contains(ex.profile.store_label.as_str()))?;
    let ancestors: Vec<_> = spans[label_idx].ancestors().map(|a| a.id()).collect();

    spans[..label_idx]
        .iter()
        .rev()
        .find(|s| !ancestors.contains(&s.id()))
        .and_then(|s| non_empty(element_text(s)))
}

// ── Price ──

fn price_by_currency(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<String> {
    page.document
        .select(&ex.span)
        .find(|el| own_text(el).contains(ex.profile.currency_glyph.as_str()))
        .and_then(|el| non_empty(element_text(&el)))
}

// ── Rating ──

fn rating_by_class(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<f64> {
    page.document
        .select(&ex.rating_class)
        .find(|el| own_text(el).contains('/'))
        .and_then(|el| ex.parse_rating(&element_text(&el)))
}

fn rating_in_body(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<f64> {
    ex.parse_rating(page.body_text)
}

// ── First review date ──

fn date_in_body(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<String> {
    ex.find_review_date(page.body_text)
}

// ── Review text ──

fn review_snippets(page: &ParsedPage<'_>, ex: &PageExtractor) -> Option<String> {
    let snippets: Vec<String> = page
        .document
        .select(&ex.review_span)
        .filter(|el| own_text(el).chars().count() > ex.profile.min_review_chars)
        .take(ex.profile.max_review_snippets)
        .map(|el| element_text(&el))
        .collect();

    if snippets.is_empty() {
        None
    } else {
        Some(snippets.join(&ex.profile.review_separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PageExtractor {
        PageExtractor::new(ExtractionProfile::default()).unwrap()
    }

    fn snapshot(body: &str) -> PageSnapshot {
        PageSnapshot::from_html(
            "https://shop.example/product/phone-1/",
            format!("<html><body>{body}</body></html>"),
        )
    }

    #[test]
    fn test_parse_rating_comma_decimal() {
        let ex = extractor();
        assert_eq!(ex.parse_rating("4,5 / 5 отзывов"), Some(4.5));
        assert_eq!(ex.parse_rating("Рейтинг 4.8/5"), Some(4.8));
        assert_eq!(ex.parse_rating("5 / 5"), Some(5.0));
    }

    #[test]
    fn test_parse_rating_absent() {
        let ex = extractor();
        assert_eq!(ex.parse_rating("нет оценок"), None);
        assert_eq!(ex.parse_rating("4,5 из 10"), None);
    }

    #[test]
    fn test_find_review_date_first_in_document_order() {
        let ex = extractor();
        let text = "Отзыв от 7 декабря 2025. Ответ 12 января 2026. Ещё 3 марта 2024";
        assert_eq!(ex.find_review_date(text).as_deref(), Some("7 декабря 2025"));
    }

    #[test]
    fn test_find_review_date_case_insensitive() {
        let ex = extractor();
        assert_eq!(
            ex.find_review_date("доставлен 21 Октября 2024").as_deref(),
            Some("21 Октября 2024")
        );
        assert_eq!(ex.find_review_date("7 december 2025"), None);
    }

    #[test]
    fn test_review_snippets_keep_long_spans_in_order() {
        let lengths = [10, 45, 50, 60, 20];
        let spans: String = lengths
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let text: String = std::iter::repeat(char::from(b'a' + i as u8))
                    .take(*n)
                    .collect();
                format!("<span>{text}</span>")
            })
            .collect();
        let snap = snapshot(&format!("<div>{spans}</div>"));

        let fields = extractor().review_fields(&snap);
        let expected = ["b".repeat(45), "c".repeat(50), "d".repeat(60)].join(" || ");
        assert_eq!(fields.review_text, Some(expected));
    }

    #[test]
    fn test_review_snippets_capped_at_three() {
        let long = "Очень хороший телефон, пользуюсь уже полгода и доволен";
        let spans: String = (1..=4)
            .map(|i| format!("<span>{long} {i}</span>"))
            .collect();
        let fields = extractor().review_fields(&snapshot(&format!("<div>{spans}</div>")));
        let text = fields.review_text.unwrap();
        assert_eq!(text.matches(" || ").count(), 2);
        assert!(!text.contains(&format!("{long} 4")));
    }

    #[test]
    fn test_review_snippets_require_div_ancestor() {
        let long = "x".repeat(80);
        let fields = extractor().review_fields(&snapshot(&format!("<p><span>{long}</span></p>")));
        assert_eq!(fields.review_text, None);
    }

    #[test]
    fn test_review_fields_from_reviews_page() {
        let html = r#"
            <div class="price-box"><span>12 999 ₽</span></div>
            <div class="zM_28-rating">4,7 / 5</div>
            <div>
              <span>Отзыв от 7 декабря 2025</span>
              <span>Камера отличная, батарея держит два дня без подзарядки вообще</span>
            </div>
        "#;
        let fields = extractor().review_fields(&snapshot(html));
        assert_eq!(fields.raw_price.as_deref(), Some("12 999 ₽"));
        assert_eq!(fields.rating, Some(4.7));
        assert_eq!(fields.first_review_date_text.as_deref(), Some("7 декабря 2025"));
        assert!(fields.review_text.unwrap().starts_with("Камера отличная"));
    }

    #[test]
    fn test_rating_falls_back_to_body_text() {
        let html = r#"<div class="zM_28">без оценки</div><p>Средняя оценка 3,9 / 5</p>"#;
        let fields = extractor().review_fields(&snapshot(html));
        assert_eq!(fields.rating, Some(3.9));
    }

    #[test]
    fn test_empty_page_yields_absent_fields() {
        let fields = extractor().review_fields(&snapshot(""));
        assert_eq!(fields, ReviewPageFields::default());
    }

    #[test]
    fn test_seller_by_class() {
        let html = r#"<h1>Смартфон X 128 ГБ</h1><a><span class="b35_3_16 tsBody">Electro Store</span></a>"#;
        let fields = extractor().product_fields(&snapshot(html));
        assert_eq!(fields.title, "Смартфон X 128 ГБ");
        assert_eq!(fields.seller, "Electro Store");
    }

    #[test]
    fn test_seller_class_ignores_short_text() {
        let html = r#"<span class="b35_3_16">ок</span><div><span>Mobile Hub</span><span>Перейти</span></div>"#;
        let fields = extractor().product_fields(&snapshot(html));
        assert_eq!(fields.seller, "Mobile Hub");
    }

    #[test]
    fn test_seller_skips_label_ancestor() {
        let html = r#"<span>Gadget World</span><span class="btn"><span>Перейти</span></span>"#;
        let fields = extractor().product_fields(&snapshot(html));
        assert_eq!(fields.seller, "Gadget World");
    }

    #[test]
    fn test_product_fields_fallbacks() {
        let fields = extractor().product_fields(&snapshot("<p>пусто</p>"));
        assert_eq!(fields.title, "Название не найдено");
        assert_eq!(fields.seller, "Не найден");
    }

    #[test]
    fn test_invalid_month_list_rejected() {
        let profile = ExtractionProfile {
            months: vec!["jan".to_string()],
            ..ExtractionProfile::default()
        };
        assert!(PageExtractor::new(profile).is_err());
    }

    #[test]
    fn test_invalid_title_selector_rejected() {
        let profile = ExtractionProfile {
            title_selector: "h1[".to_string(),
            ..ExtractionProfile::default()
        };
        let err = PageExtractor::new(profile).unwrap_err();
        assert!(matches!(err, HarvestError::Selector { .. }));
    }
}
