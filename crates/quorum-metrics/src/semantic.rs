use crate::{normalize, round3};
use quorum_core::model::AccuracyScore;
use std::collections::HashSet;

/// Even blend of word-set Jaccard and character-bigram Sørensen–Dice.
pub fn score(produced: &str, expected: Option<&str>) -> anyhow::Result<AccuracyScore> {
    let expected = expected
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("semantic_similarity requires an expected output"))?;

    let jaccard = jaccard(&words(produced), &words(expected));
    let dice = strsim::sorensen_dice(&normalize(produced), &normalize(expected));
    let score = round3(0.5 * jaccard + 0.5 * dice);

    Ok(AccuracyScore {
        score,
        reasoning: format!(
            "Word overlap {:.3}, character similarity {:.3}",
            jaccard, dice
        ),
    })
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        let r = score("The  Cat sat on\nthe mat", Some("the cat sat on the mat")).unwrap();
        assert_eq!(r.score, 1.0);
    }

    #[test]
    fn test_ordering_of_similarity() {
        let expected = Some("The capital of France is Paris");
        let close = score("Paris is the capital of France", expected).unwrap().score;
        let far = score("Bananas are yellow", expected).unwrap().score;
        assert!(close > far, "{close} <= {far}");
        assert!((0.0..=1.0).contains(&far));
    }

    #[test]
    fn test_jaccard_edges() {
        let empty = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&words("a b"), &words("c d")), 0.0);
        assert_eq!(jaccard(&words("a b"), &words("b c")), 1.0 / 3.0);
    }

    #[test]
    fn test_missing_expected() {
        assert!(score("x", None).is_err());
    }
}
