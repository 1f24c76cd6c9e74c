use crate::{normalize, round3};
use quorum_core::model::AccuracyScore;

/// Fraction of the concepts mentioned anywhere in the response.
pub fn score(produced: &str, concepts: Option<&[String]>) -> anyhow::Result<AccuracyScore> {
    let concepts = concepts.unwrap_or_default();
    if concepts.is_empty() {
        anyhow::bail!("partial_credit requires at least one concept");
    }

    let haystack = normalize(produced);
    let (found, missing): (Vec<&String>, Vec<&String>) = concepts
        .iter()
        .partition(|c| haystack.contains(&normalize(c)));

    let score = round3(found.len() as f64 / concepts.len() as f64);
    let mut reasoning = format!("Found {} of {} concepts", found.len(), concepts.len());
    if !found.is_empty() {
        reasoning.push_str(&format!(": {}", join(&found)));
    }
    if !missing.is_empty() {
        reasoning.push_str(&format!(". Missing: {}", join(&missing)));
    }

    Ok(AccuracyScore { score, reasoning })
}

fn join(items: &[&String]) -> String {
    items.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}
