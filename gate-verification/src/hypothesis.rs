//! Evidence-weighted hypothesis scoring.

use gate_primitives::Evidence;

/// Number of evidence summaries echoed back in result details.
pub const SUMMARY_SAMPLE: usize = 3;

/// Aggregate of a body of evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceScore {
    /// Number of evidence items.
    pub count: usize,
    /// Mean of `strength * relevance`.
    pub mean: f64,
    /// First few summaries.
    pub summaries: Vec<String>,
}

/// Scores `evidence`, returning `None` when there is none.
#[must_use]
pub fn score(evidence: &[Evidence]) -> Option<EvidenceScore> {
    if evidence.is_empty() {
        return None;
    }
    let total: f64 = evidence.iter().map(Evidence::score).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / evidence.len() as f64;
    Some(EvidenceScore {
        count: evidence.len(),
        mean,
        summaries: evidence
            .iter()
            .take(SUMMARY_SAMPLE)
            .map(|e| e.summary().to_owned())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_evidence_has_no_score() {
        assert!(score(&[]).is_none());
    }

    #[test]
    fn mean_of_products() {
        let evidence = vec![
            Evidence::new("benchmark", 1.0, 0.8).unwrap(),
            Evidence::new("review", 0.5, 0.4).unwrap(),
            Evidence::new("canary", 0.9, 1.0).unwrap(),
            Evidence::new("survey", 0.1, 0.1).unwrap(),
        ];
        let scored = score(&evidence).unwrap();

        assert_eq!(scored.count, 4);
        assert!((scored.mean - (0.8 + 0.2 + 0.9 + 0.01) / 4.0).abs() < 1e-9);
        assert_eq!(scored.summaries, vec!["benchmark", "review", "canary"]);
    }
}
