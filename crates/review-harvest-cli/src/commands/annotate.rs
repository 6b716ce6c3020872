//! `review-harvest annotate`: send the sampled reviews to GigaChat.

use anyhow::{Context, Result};

use review_harvest::annotate::{read_review_texts, write_annotations};
use review_harvest::{AnnotationRecord, Annotator};

use crate::config::{read_credential, HarvestConfig};
use crate::gigachat::GigaChatClient;

pub async fn run(config: &HarvestConfig) -> Result<Vec<AnnotationRecord>> {
    let settings = &config.annotation;
    let input = config.annotation_input();

    let reviews = read_review_texts(input, settings.annotator.max_reviews)
        .with_context(|| format!("cannot load reviews from {}", input.display()))?;
    println!("Loaded {} reviews for annotation", reviews.len());

    let credential = read_credential(&settings.credential_env)?;
    let client = GigaChatClient::new(credential, settings.gigachat.clone())?;
    let annotator = Annotator::new(&client, settings.annotator.clone());

    let records = annotator.annotate_all(&reviews).await;
    write_annotations(&settings.output, &records)
        .with_context(|| format!("failed to write {}", settings.output.display()))?;

    let structured = records.iter().filter(|r| r.is_structured()).count();
    println!(
        "Annotated {} reviews ({} structured, {} degraded) -> {}",
        records.len(),
        structured,
        records.len() - structured,
        settings.output.display()
    );
    Ok(records)
}
