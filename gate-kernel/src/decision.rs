//! Gate output records.

use std::fmt;

use gate_constitution::ConstitutionalReview;
use gate_parliament::VoteResult;
use gate_primitives::{ApprovalId, RequestId};
use gate_verification::VerificationResult;
use serde::{Deserialize, Serialize};

/// Final pipeline outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The action may proceed.
    Approved,
    /// The action must not proceed.
    Denied,
    /// A human or higher authority must decide.
    Escalated,
    /// The pipeline failed; treat as not approved.
    Error,
}

impl Outcome {
    /// Stable identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Escalated => "escalated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage the pipeline entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    /// Low-risk shortcut taken.
    QuickCheck,
    /// Constitution reviewed the action.
    ConstitutionalReview,
    /// Verification checks ran.
    Verification,
    /// Parliament voted.
    ParliamentaryReview,
    /// All stages passed and the decision was aggregated.
    FinalDecision,
}

/// Result of [`GovernanceGate::evaluate`](crate::GovernanceGate::evaluate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Identifier of this evaluation.
    pub request_id: RequestId,
    /// Outcome.
    pub outcome: Outcome,
    /// Confidence in the outcome, in `[0, 1]`.
    pub confidence: f64,
    /// Stages entered, in order.
    pub processing_steps: Vec<ProcessingStep>,
    /// Human-readable trail explaining the outcome.
    pub reasoning: Vec<String>,
    /// Constitutional review, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ConstitutionalReview>,
    /// Verification results, when checks ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification: Vec<VerificationResult>,
    /// Committee result, when parliament decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteResult>,
    /// Pending approval opened for an escalation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
    /// Error text for [`Outcome::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent, in milliseconds.
    pub processing_time_ms: u64,
}

impl Decision {
    pub(crate) fn error(request_id: RequestId, error: String) -> Self {
        Self {
            request_id,
            outcome: Outcome::Error,
            confidence: 0.0,
            processing_steps: Vec::new(),
            reasoning: vec![format!("governance evaluation failed: {error}")],
            review: None,
            verification: Vec::new(),
            vote: None,
            approval_id: None,
            error: Some(error),
            processing_time_ms: 0,
        }
    }

    /// Returns `true` for [`Outcome::Approved`].
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.outcome == Outcome::Approved
    }

    /// Returns `true` if the pipeline entered `step`.
    #[must_use]
    pub fn took_step(&self, step: ProcessingStep) -> bool {
        self.processing_steps.contains(&step)
    }
}

/// Accumulates stage output until the pipeline concludes.
#[derive(Debug, Default)]
pub(crate) struct Trail {
    steps: Vec<ProcessingStep>,
    reasoning: Vec<String>,
    confidences: Vec<f64>,
    pub(crate) review: Option<ConstitutionalReview>,
    pub(crate) verification: Vec<VerificationResult>,
    pub(crate) vote: Option<VoteResult>,
}

/// Confidence when no stage contributed one.
pub(crate) const DEFAULT_CONFIDENCE: f64 = 0.7;

impl Trail {
    pub(crate) fn step(&mut self, step: ProcessingStep) {
        self.steps.push(step);
    }

    pub(crate) fn note(&mut self, reason: impl Into<String>) {
        self.reasoning.push(reason.into());
    }

    pub(crate) fn contribute(&mut self, confidence: f64) {
        self.confidences.push(confidence);
    }

    /// Mean of contributed confidences.
    pub(crate) fn aggregate_confidence(&self) -> f64 {
        if self.confidences.is_empty() {
            return DEFAULT_CONFIDENCE;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.confidences.len() as f64;
        self.confidences.iter().sum::<f64>() / count
    }

    pub(crate) fn conclude(self, request_id: RequestId, outcome: Outcome, confidence: f64) -> Decision {
        Decision {
            request_id,
            outcome,
            confidence: confidence.clamp(0.0, 1.0),
            processing_steps: self.steps,
            reasoning: self.reasoning,
            review: self.review,
            verification: self.verification,
            vote: self.vote,
            approval_id: None,
            error: None,
            processing_time_ms: 0,
        }
    }
}
