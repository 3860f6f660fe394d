//! Verification check outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of check that produced a [`VerificationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// Static analysis of a code snippet.
    CodeAnalysis,
    /// The snippet did not parse.
    SyntaxCheck,
    /// Evidence-weighted hypothesis check.
    Hypothesis,
    /// Test suite run against target code.
    UnitTests,
}

impl CheckType {
    /// Stable identifier used in logs and serialized output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeAnalysis => "code_analysis",
            Self::SyntaxCheck => "syntax_check",
            Self::Hypothesis => "hypothesis",
            Self::UnitTests => "unit_tests",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single verification check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    check_type: CheckType,
    target: String,
    passed: bool,
    details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    checked_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Creates a passing result with no details.
    #[must_use]
    pub fn passed(check_type: CheckType, target: impl Into<String>) -> Self {
        Self {
            check_type,
            target: target.into(),
            passed: true,
            details: Map::new(),
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// Creates a failed result carrying `error`.
    #[must_use]
    pub fn failed(check_type: CheckType, target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            passed: false,
            error: Some(error.into()),
            ..Self::passed(check_type, target)
        }
    }

    /// Overrides the pass flag.
    #[must_use]
    pub fn with_passed(mut self, passed: bool) -> Self {
        self.passed = passed;
        self
    }

    /// Adds one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Sets the error message, marking the result failed.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.passed = false;
        self.error = Some(error.into());
        self
    }

    /// Check that produced this result.
    #[must_use]
    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    /// What was checked.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the check passed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.passed
    }

    /// Check-specific details.
    #[must_use]
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Looks up one detail entry.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the check completed.
    #[must_use]
    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marks_result_failed() {
        let result = VerificationResult::passed(CheckType::CodeAnalysis, "snippet")
            .with_detail("complexity", 3)
            .with_error("backend crashed");

        assert!(!result.is_passed());
        assert_eq!(result.error(), Some("backend crashed"));
        assert_eq!(result.detail("complexity"), Some(&Value::from(3)));
    }

    #[test]
    fn serializes_check_type_in_snake_case() {
        let result = VerificationResult::failed(CheckType::SyntaxCheck, "snippet", "bad token");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["check_type"], "syntax_check");
        assert_eq!(json["passed"], false);
    }
}
