//! The verification engine.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gate_primitives::{Evidence, VerificationInputs};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{AnalysisBackend, BackendError};
use crate::code;
use crate::hypothesis;
use crate::result::{CheckType, VerificationResult};
use crate::runner::{StaticTestRunner, TestRunner};

/// Languages [`VerificationEngine::verify_code`] understands.
pub const SUPPORTED_LANGUAGES: &[&str] = &["rust", "rs"];

const DEFAULT_TARGET: &str = "code_snippet";

/// Errors raised while building a [`VerificationEngine`].
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Configuration rejected.
    #[error("invalid verification configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result alias for verification setup.
pub type VerificationResultOf<T> = Result<T, VerificationError>;

/// Tunables for the built-in checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Complexity above which a snippet is flagged.
    pub complexity_limit: u32,
    /// Snippets longer than this with no function definition are flagged.
    pub unstructured_len: usize,
    /// Threshold used when a hypothesis check supplies none.
    pub default_confidence_threshold: f64,
    /// Upper bound for a test run, in milliseconds.
    pub unit_test_timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            complexity_limit: 10,
            unstructured_len: 50,
            default_confidence_threshold: 0.7,
            unit_test_timeout_ms: 30_000,
        }
    }
}

impl VerificationConfig {
    /// Checks the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::InvalidConfig`] for an out-of-range threshold or a zero timeout.
    pub fn validate(&self) -> VerificationResultOf<()> {
        if !(0.0..=1.0).contains(&self.default_confidence_threshold) {
            return Err(VerificationError::InvalidConfig(
                "default_confidence_threshold must be within [0, 1]",
            ));
        }
        if self.unit_test_timeout_ms == 0 {
            return Err(VerificationError::InvalidConfig(
                "unit_test_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Default unit-test timeout as a [`Duration`].
    #[must_use]
    pub fn unit_test_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_test_timeout_ms)
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    /// Checks performed.
    pub total_checks: u64,
    /// Checks that passed.
    pub passed_checks: u64,
    /// Checks that failed.
    pub failed_checks: u64,
    /// Security findings across all code checks.
    pub security_issues_found: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    passed: AtomicU64,
    failed: AtomicU64,
    security: AtomicU64,
}

impl Counters {
    fn record(&self, result: &VerificationResult, security_issues: usize) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if result.is_passed() {
            self.passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.security
            .fetch_add(security_issues as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> VerificationStats {
        VerificationStats {
            total_checks: self.total.load(Ordering::Relaxed),
            passed_checks: self.passed.load(Ordering::Relaxed),
            failed_checks: self.failed.load(Ordering::Relaxed),
            security_issues_found: self.security.load(Ordering::Relaxed),
        }
    }
}

/// Runs static and empirical checks on action payloads.
///
/// Checks never return errors: every failure, including tool failures, is
/// a failed [`VerificationResult`].
pub struct VerificationEngine {
    config: VerificationConfig,
    backends: Vec<Arc<dyn AnalysisBackend>>,
    runner: Arc<dyn TestRunner>,
    counters: Counters,
}

impl fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationEngine")
            .field("config", &self.config)
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("runner", &self.runner.name())
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self {
            config: VerificationConfig::default(),
            backends: Vec::new(),
            runner: Arc::new(StaticTestRunner),
            counters: Counters::default(),
        }
    }
}

impl VerificationEngine {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`VerificationConfig::validate`] failures.
    pub fn new(config: VerificationConfig) -> VerificationResultOf<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Adds an external analyser consulted by [`verify_code`](Self::verify_code).
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Replaces the test runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> VerificationStats {
        self.counters.snapshot()
    }

    /// Statically analyses `code`.
    ///
    /// `context["target"]`, when a string, names the snippet in the result.
    pub fn verify_code(
        &self,
        code: &str,
        language: &str,
        context: &Map<String, Value>,
    ) -> VerificationResult {
        let target = context
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TARGET);
        let language = language.to_ascii_lowercase();

        if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
            let result = VerificationResult::failed(
                CheckType::CodeAnalysis,
                target,
                format!("unsupported language: {language}"),
            );
            self.counters.record(&result, 0);
            return result;
        }

        let report = match code::analyze(code) {
            Ok(report) => report,
            Err(err) => {
                debug!(snippet = target, error = %err, "snippet failed to parse");
                let result = VerificationResult::failed(
                    CheckType::SyntaxCheck,
                    target,
                    format!("syntax error: {err}"),
                );
                self.counters.record(&result, 0);
                return result;
            }
        };

        let mut issues = Vec::new();
        if report.complexity > self.config.complexity_limit {
            issues.push(format!(
                "complexity {} exceeds limit {}",
                report.complexity, self.config.complexity_limit
            ));
        }
        issues.extend(
            report
                .risky_imports
                .iter()
                .map(|import| format!("risky import {import}")),
        );
        if code.trim().len() > self.config.unstructured_len && report.functions == 0 {
            issues.push("code is not organised into functions".to_owned());
        }
        let mut security_issues = report.security_issues.clone();

        let mut notes = Vec::new();
        let mut backend_error = None;
        for backend in &self.backends {
            match backend.analyze(code, &language) {
                Ok(extra) => {
                    issues.extend(extra.issues);
                    security_issues.extend(extra.security_issues);
                }
                Err(BackendError::Unavailable { reason }) => {
                    debug!(backend = backend.name(), %reason, "analysis backend unavailable");
                    notes.push(format!("{} unavailable: {reason}", backend.name()));
                }
                Err(err @ BackendError::Failed { .. }) => {
                    warn!(backend = backend.name(), error = %err, "analysis backend failed");
                    backend_error.get_or_insert_with(|| format!("{}: {err}", backend.name()));
                }
            }
        }

        let passed = issues.is_empty() && security_issues.is_empty() && backend_error.is_none();
        let mut result = VerificationResult::passed(CheckType::CodeAnalysis, target)
            .with_passed(passed)
            .with_detail("language", language)
            .with_detail("complexity", report.complexity)
            .with_detail("function_count", report.functions)
            .with_detail("imports", report.imports)
            .with_detail("security_issue_count", security_issues.len())
            .with_detail("security_issues", security_issues.clone())
            .with_detail("issues", issues);
        if !notes.is_empty() {
            result = result.with_detail("notes", notes);
        }
        if let Some(error) = backend_error {
            result = result.with_error(error);
        }

        info!(snippet = target, passed, security = security_issues.len(), "code verified");
        self.counters.record(&result, security_issues.len());
        result
    }

    /// Checks a hypothesis against weighted evidence.
    ///
    /// Uses [`VerificationConfig::default_confidence_threshold`] when
    /// `threshold` is `None`.
    pub fn verify_hypothesis(
        &self,
        hypothesis: &str,
        evidence: &[Evidence],
        threshold: Option<f64>,
    ) -> VerificationResult {
        let threshold = threshold.unwrap_or(self.config.default_confidence_threshold);
        let result = match hypothesis::score(evidence) {
            None => VerificationResult::failed(CheckType::Hypothesis, hypothesis, "no evidence provided")
                .with_detail("evidence_count", 0),
            Some(scored) => VerificationResult::passed(CheckType::Hypothesis, hypothesis)
                .with_passed(scored.mean >= threshold)
                .with_detail("evidence_count", scored.count)
                .with_detail("confidence", scored.mean)
                .with_detail("threshold", threshold)
                .with_detail("evidence_summary", scored.summaries),
        };
        debug!(passed = result.is_passed(), threshold, "hypothesis verified");
        self.counters.record(&result, 0);
        result
    }

    /// Runs `test_code` against `target_code` through the configured runner.
    ///
    /// Uses [`VerificationConfig::unit_test_timeout`] when `timeout` is `None`.
    pub async fn run_unit_tests(
        &self,
        test_code: &str,
        target_code: &str,
        timeout: Option<Duration>,
    ) -> VerificationResult {
        let result = self.unit_tests_inner(test_code, target_code, timeout).await;
        self.counters.record(&result, 0);
        result
    }

    async fn unit_tests_inner(
        &self,
        test_code: &str,
        target_code: &str,
        timeout: Option<Duration>,
    ) -> VerificationResult {
        const TARGET: &str = "unit_tests";

        for (snippet, source) in [("test_code", test_code), ("target_code", target_code)] {
            if let Err(err) = code::parse_check(source) {
                return VerificationResult::failed(
                    CheckType::UnitTests,
                    TARGET,
                    format!("{snippet} failed to parse: {err}"),
                )
                .with_detail("snippet", snippet);
            }
        }

        let timeout = timeout.unwrap_or_else(|| self.config.unit_test_timeout());
        let base = VerificationResult::passed(CheckType::UnitTests, TARGET)
            .with_detail("runner", self.runner.name());
        match tokio::time::timeout(timeout, self.runner.run(test_code, target_code)).await {
            Ok(Ok(report)) => {
                let result = base
                    .with_detail("tests_run", report.tests_run)
                    .with_detail("tests_passed", report.passed)
                    .with_detail("tests_failed", report.failed);
                if report.tests_run == 0 {
                    result.with_error("no test functions found")
                } else if report.failed > 0 {
                    result.with_error(format!("{} of {} tests failed", report.failed, report.tests_run))
                } else {
                    result
                }
            }
            Ok(Err(err)) => {
                warn!(error = %err, "test runner failed");
                base.with_error(err.to_string())
            }
            Err(_) => {
                warn!(?timeout, "test run timed out");
                base.with_error(format!("test run timed out after {}ms", timeout.as_millis()))
            }
        }
    }

    /// Runs every check whose inputs are present, in code, hypothesis, unit-test order.
    pub async fn verify_inputs(
        &self,
        inputs: &VerificationInputs,
        context: &Map<String, Value>,
    ) -> Vec<VerificationResult> {
        let mut results = Vec::new();
        if let Some(code) = &inputs.code {
            let language = inputs.language.as_deref().unwrap_or("rust");
            results.push(self.verify_code(code, language, context));
        }
        if let Some(hypothesis) = &inputs.hypothesis {
            results.push(self.verify_hypothesis(
                hypothesis,
                &inputs.evidence,
                inputs.confidence_threshold,
            ));
        }
        if let (Some(test_code), Some(target_code)) = (&inputs.test_code, &inputs.target_code) {
            results.push(self.run_unit_tests(test_code, target_code, None).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::BackendReport;
    use crate::runner::{RunnerError, TestReport};

    struct MissingBackend;

    impl AnalysisBackend for MissingBackend {
        fn name(&self) -> &str {
            "clippy"
        }

        fn analyze(&self, _code: &str, _language: &str) -> Result<BackendReport, BackendError> {
            Err(BackendError::Unavailable {
                reason: "not installed".into(),
            })
        }
    }

    struct CrashingBackend;

    impl AnalysisBackend for CrashingBackend {
        fn name(&self) -> &str {
            "audit"
        }

        fn analyze(&self, _code: &str, _language: &str) -> Result<BackendReport, BackendError> {
            Err(BackendError::Failed {
                reason: "segfault".into(),
            })
        }
    }

    struct SlowRunner;

    #[async_trait]
    impl TestRunner for SlowRunner {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _test: &str, _target: &str) -> Result<TestReport, RunnerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TestReport::default())
        }
    }

    fn no_context() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn clean_code_passes() {
        let engine = VerificationEngine::default();
        let result = engine.verify_code(
            "fn add(a: i32, b: i32) -> i32 { a + b }",
            "rust",
            &no_context(),
        );

        assert!(result.is_passed());
        assert_eq!(result.check_type(), CheckType::CodeAnalysis);
        assert_eq!(result.detail("function_count"), Some(&Value::from(1)));
    }

    #[test]
    fn dynamic_execution_fails_with_security_issue() {
        let engine = VerificationEngine::default();
        let result = engine.verify_code("let _ = eval(user_input);", "rust", &no_context());

        assert!(!result.is_passed());
        assert_eq!(result.detail("security_issue_count"), Some(&Value::from(1)));
        assert_eq!(engine.stats().security_issues_found, 1);
    }

    #[test]
    fn syntax_error_is_a_failed_syntax_check() {
        let engine = VerificationEngine::default();
        let result = engine.verify_code("fn broken( {", "rust", &no_context());

        assert!(!result.is_passed());
        assert_eq!(result.check_type(), CheckType::SyntaxCheck);
        assert!(result.error().unwrap().starts_with("syntax error"));
    }

    #[test]
    fn unsupported_language_fails() {
        let engine = VerificationEngine::default();
        let result = engine.verify_code("print('hi')", "python", &no_context());

        assert!(!result.is_passed());
        assert_eq!(result.error(), Some("unsupported language: python"));
    }

    #[test]
    fn unstructured_and_complex_code_is_flagged() {
        let engine = VerificationEngine::default();
        let unstructured =
            "let total = values.iter().map(|v| v * 2).filter(|v| *v > 10).sum::<i32>();";
        assert!(!engine.verify_code(unstructured, "rust", &no_context()).is_passed());

        let branches = (0..11)
            .map(|i| format!("if x == {i} {{ return {i}; }}"))
            .collect::<String>();
        let complex = format!("fn pick(x: i32) -> i32 {{ {branches} 0 }}");
        let result = engine.verify_code(&complex, "rust", &no_context());
        assert!(!result.is_passed());
        assert_eq!(result.detail("complexity"), Some(&Value::from(11)));
    }

    #[test]
    fn unavailable_backend_is_a_note() {
        let engine = VerificationEngine::default().with_backend(Arc::new(MissingBackend));
        let result = engine.verify_code("fn ok() {}", "rust", &no_context());

        assert!(result.is_passed());
        assert!(result.detail("notes").is_some());
    }

    #[test]
    fn failing_backend_fails_only_the_code_check() {
        let engine = VerificationEngine::default().with_backend(Arc::new(CrashingBackend));
        let code = engine.verify_code("fn ok() {}", "rust", &no_context());
        assert!(!code.is_passed());
        assert!(code.error().unwrap().contains("segfault"));

        let evidence = [Evidence::new("trial", 1.0, 1.0).unwrap()];
        assert!(engine.verify_hypothesis("works", &evidence, None).is_passed());
    }

    #[test]
    fn hypothesis_compares_mean_to_threshold() {
        let engine = VerificationEngine::default();
        let evidence = [
            Evidence::new("a", 1.0, 1.0).unwrap(),
            Evidence::new("b", 0.5, 1.0).unwrap(),
        ];

        assert!(engine.verify_hypothesis("h", &evidence, Some(0.75)).is_passed());
        assert!(!engine.verify_hypothesis("h", &evidence, Some(0.76)).is_passed());

        let empty = engine.verify_hypothesis("h", &[], None);
        assert_eq!(empty.error(), Some("no evidence provided"));
    }

    #[tokio::test]
    async fn unit_tests_name_the_unparseable_snippet() {
        let engine = VerificationEngine::default();
        let result = engine
            .run_unit_tests("#[test] fn t() {}", "fn target( {", None)
            .await;

        assert!(!result.is_passed());
        assert_eq!(result.detail("snippet"), Some(&Value::from("target_code")));
    }

    #[tokio::test]
    async fn unit_tests_pass_with_static_runner() {
        let engine = VerificationEngine::default();
        let result = engine
            .run_unit_tests("#[test] fn t() { assert!(true); }", "fn target() {}", None)
            .await;

        assert!(result.is_passed());
        assert_eq!(result.detail("tests_run"), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn unit_tests_accept_a_statement_block_suite() {
        let engine = VerificationEngine::default();
        let suite = "let two = 1 + 1;\n#[test]\nfn adds() { assert_eq!(2, 2); }";
        let result = engine.run_unit_tests(suite, "fn target() {}", None).await;

        assert!(result.is_passed(), "{:?}", result.error());
        assert_eq!(result.detail("tests_run"), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn unit_test_timeout_fails_the_check() {
        let engine = VerificationEngine::default().with_runner(Arc::new(SlowRunner));
        let result = engine
            .run_unit_tests("#[test] fn t() {}", "fn target() {}", Some(Duration::from_millis(10)))
            .await;

        assert!(!result.is_passed());
        assert!(result.error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn verify_inputs_runs_only_present_checks() {
        let engine = VerificationEngine::default();
        let inputs = VerificationInputs {
            code: Some("fn ok() {}".into()),
            hypothesis: Some("safe".into()),
            ..VerificationInputs::default()
        };
        let results = engine.verify_inputs(&inputs, &no_context()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].check_type(), CheckType::Hypothesis);
        assert!(!results[1].is_passed());
        assert_eq!(engine.stats().total_checks, 2);
        assert_eq!(engine.stats().failed_checks, 1);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = VerificationConfig {
            default_confidence_threshold: 1.5,
            ..VerificationConfig::default()
        };
        assert!(VerificationEngine::new(config).is_err());
    }
}
