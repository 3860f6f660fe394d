//! Pluggable external analysers consulted alongside the built-in checks.

use thiserror::Error;

/// Errors raised by an [`AnalysisBackend`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend is not installed or not reachable. The built-in checks still decide.
    #[error("analysis backend unavailable: {reason}")]
    Unavailable {
        /// Why the backend could not be used.
        reason: String,
    },
    /// The backend started but failed before producing a report.
    #[error("analysis backend failed: {reason}")]
    Failed {
        /// Failure description.
        reason: String,
    },
}

/// Findings contributed by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendReport {
    /// General quality issues.
    pub issues: Vec<String>,
    /// Security findings.
    pub security_issues: Vec<String>,
}

/// An external static analyser.
pub trait AnalysisBackend: Send + Sync {
    /// Name shown in notes and logs.
    fn name(&self) -> &str;

    /// Analyses `code` written in `language`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the tool cannot run at all,
    /// or [`BackendError::Failed`] when it fails mid-run.
    fn analyze(&self, code: &str, language: &str) -> Result<BackendReport, BackendError>;
}
