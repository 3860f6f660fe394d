//! Verification checks for proposed agent actions.
//!
//! The [`VerificationEngine`] statically analyses Rust snippets with `syn`,
//! scores hypotheses against weighted [`Evidence`](gate_primitives::Evidence),
//! and runs test suites through a pluggable [`TestRunner`]. Every check
//! yields a [`VerificationResult`]; tool failures fail the check instead of
//! propagating.

#![warn(missing_docs, clippy::pedantic)]

pub mod backend;
pub mod code;
pub mod engine;
pub mod hypothesis;
pub mod result;
pub mod runner;

pub use backend::{AnalysisBackend, BackendError, BackendReport};
pub use code::{CodeReport, RISKY_IMPORTS};
pub use engine::{
    SUPPORTED_LANGUAGES, VerificationConfig, VerificationEngine, VerificationError,
    VerificationResultOf, VerificationStats,
};
pub use result::{CheckType, VerificationResult};
pub use runner::{RunnerError, StaticTestRunner, TestReport, TestRunner};
