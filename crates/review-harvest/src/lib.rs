//! review-harvest: collect product listings and reviews from an infinite-scroll
//! category page, clean the resulting dataset, summarize it, and annotate a
//! sample of reviews with a chat-completion model.

pub mod annotate;
pub mod checkpoint;
pub mod dataset;
pub mod extract;
pub mod links;
pub mod page;
pub mod profile;
pub mod scrape;
pub mod stats;
pub mod table;
pub mod types;

pub use annotate::{Annotator, AnnotatorSettings, ChatClient};
pub use checkpoint::CheckpointWriter;
pub use dataset::{clean_records, CleanRecord, RatingGroup, Theme};
pub use extract::{PageExtractor, ProductPageFields, ReviewPageFields};
pub use links::{collect_links, normalize_url, LinkCollection, LinkSet, ScrollOutcome};
pub use page::{BrowserPage, PageSnapshot};
pub use profile::ExtractionProfile;
pub use scrape::{ScrapeOutcome, ScrapeSettings, Scraper};
pub use stats::StatsReport;
pub use types::*;
