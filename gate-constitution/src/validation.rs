//! Validation outcomes returned by the constitution.

use gate_primitives::TierName;
use serde::{Deserialize, Serialize};

use crate::rules::RequiredAction;

/// Identifier of the synthetic violation reported when evaluation itself fails.
pub const VALIDATION_ERROR: &str = "validation_error";
/// Identifier of the violation reported for an unknown governance tier.
pub const INVALID_GOVERNANCE_TIER: &str = "invalid_governance_tier";

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor concern.
    Low,
    /// Blocks the action, handled by the normal pipeline.
    Medium,
    /// Blocks the action and calls for parliamentary attention.
    High,
}

/// A blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule, principle, or tier requirement that was violated.
    pub rule_id: String,
    /// Human-readable explanation.
    pub message: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// Action demanded by the violated core rule, if it came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_action: Option<RequiredAction>,
}

impl Violation {
    /// Creates a violation that did not originate from a core rule.
    #[must_use]
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            severity,
            required_action: None,
        }
    }
}

/// An advisory finding; never blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Guideline that produced the warning.
    pub guideline_id: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of [`Constitution::validate`](crate::Constitution::validate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    passed: bool,
    violations: Vec<Violation>,
    warnings: Vec<Warning>,
    governance_tier: TierName,
}

impl ValidationResult {
    pub(crate) fn new(
        governance_tier: TierName,
        violations: Vec<Violation>,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
            warnings,
            governance_tier,
        }
    }

    pub(crate) fn evaluation_error(governance_tier: TierName, reason: &str) -> Self {
        Self::new(
            governance_tier,
            vec![Violation::new(VALIDATION_ERROR, reason, Severity::High)],
            Vec::new(),
        )
    }

    /// Returns `true` when no violation was raised.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Blocking findings in check order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Advisory findings.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Tier the action was validated against.
    #[must_use]
    pub fn governance_tier(&self) -> &TierName {
        &self.governance_tier
    }

    /// Returns `true` if any violation has the given rule id.
    #[must_use]
    pub fn has_violation(&self, rule_id: &str) -> bool {
        self.violations.iter().any(|v| v.rule_id == rule_id)
    }

    /// Returns `true` if any violation is high severity.
    #[must_use]
    pub fn has_high_severity(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::High)
    }
}

/// Outcome of [`Constitution::review`](crate::Constitution::review).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstitutionalReview {
    /// Underlying validation.
    pub validation: ValidationResult,
    /// The committee must vote on the action.
    pub requires_parliament: bool,
    /// A violated rule demands escalation to a higher authority.
    pub requires_escalation: bool,
    /// Suggested remediations, in violation order.
    pub recommendations: Vec<String>,
}
