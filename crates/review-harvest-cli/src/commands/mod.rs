//! Subcommand implementations for the review-harvest binary.

pub mod analyze;
pub mod annotate;
pub mod doctor;
pub mod scrape;
