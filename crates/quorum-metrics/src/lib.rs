use std::sync::Arc;

use async_trait::async_trait;
use quorum_core::model::{AccuracyScore, RubricKind};
use quorum_core::scoring::Scorer;

mod exact_match;
mod partial_credit;
mod semantic;

/// Scores responses with the built-in rubrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricScorer;

#[async_trait]
impl Scorer for RubricScorer {
    async fn score(
        &self,
        rubric: RubricKind,
        produced: &str,
        expected: Option<&str>,
        concepts: Option<&[String]>,
    ) -> anyhow::Result<AccuracyScore> {
        let scored = match rubric {
            RubricKind::ExactMatch => exact_match::score(produced, expected)?,
            RubricKind::PartialCredit => partial_credit::score(produced, concepts)?,
            RubricKind::SemanticSimilarity => semantic::score(produced, expected)?,
        };
        tracing::debug!(
            event = "response_scored",
            rubric = %rubric,
            score = scored.score,
        );
        Ok(scored)
    }
}

pub fn default_scorer() -> Arc<dyn Scorer> {
    Arc::new(RubricScorer)
}

/// Lowercase, trimmed, inner whitespace collapsed to single spaces.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub(crate) fn round3(v: f64) -> f64 {
    (v.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
