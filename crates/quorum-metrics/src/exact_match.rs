use crate::normalize;
use quorum_core::model::AccuracyScore;

/// Whole-response match, or the expected text on a line of its own.
pub fn score(produced: &str, expected: Option<&str>) -> anyhow::Result<AccuracyScore> {
    let expected = expected
        .map(normalize)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow::anyhow!("exact_match requires an expected output"))?;

    if normalize(produced) == expected {
        return Ok(AccuracyScore {
            score: 1.0,
            reasoning: "Response matches the expected output".into(),
        });
    }

    if produced.lines().any(|line| normalize(line) == expected) {
        return Ok(AccuracyScore {
            score: 1.0,
            reasoning: "Expected output found as a complete line of the response".into(),
        });
    }

    Ok(AccuracyScore {
        score: 0.0,
        reasoning: "Response does not match the expected output".into(),
    })
}
