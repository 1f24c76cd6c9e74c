use crate::model::{AccuracyScore, RubricKind};
use async_trait::async_trait;

/// Grades one response against the evaluation's rubric.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        rubric: RubricKind,
        produced: &str,
        expected: Option<&str>,
        concepts: Option<&[String]>,
    ) -> anyhow::Result<AccuracyScore>;
}
