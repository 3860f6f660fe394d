//! Evidence items supporting or refuting a hypothesis.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single weighted piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    summary: String,
    strength: f64,
    relevance: f64,
}

impl Evidence {
    /// Creates an evidence item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEvidence`] when `strength` or `relevance` is not
    /// a finite value in `[0, 1]`.
    pub fn new(summary: impl Into<String>, strength: f64, relevance: f64) -> Result<Self> {
        for (label, value) in [("strength", strength), ("relevance", relevance)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidEvidence {
                    reason: format!("{label} must be within [0, 1], got {value}"),
                });
            }
        }

        Ok(Self {
            summary: summary.into(),
            strength,
            relevance,
        })
    }

    /// Short human-readable description.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// How strongly the evidence supports the hypothesis.
    #[must_use]
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// How relevant the evidence is to the hypothesis.
    #[must_use]
    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    /// Weighted score, `strength * relevance`.
    ///
    /// Deserialized items bypass [`Evidence::new`], so both factors are
    /// clamped here.
    #[must_use]
    pub fn score(&self) -> f64 {
        clamp_unit(self.strength) * clamp_unit(self.relevance)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_multiplies_factors() {
        let evidence = Evidence::new("benchmarks", 0.8, 0.5).unwrap();
        assert!((evidence.score() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(Evidence::new("bad", 1.5, 0.5).is_err());
        assert!(Evidence::new("bad", 0.5, f64::NAN).is_err());
    }

    #[test]
    fn deserialized_values_are_clamped() {
        let evidence: Evidence =
            serde_json::from_str(r#"{"summary":"x","strength":3.0,"relevance":0.5}"#).unwrap();
        assert!((evidence.score() - 0.5).abs() < f64::EPSILON);
    }
}
