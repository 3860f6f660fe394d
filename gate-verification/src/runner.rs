//! Test execution seam.

use async_trait::async_trait;
use syn::visit::{self, Visit};
use thiserror::Error;

use crate::code::Source;

/// Failure of a [`TestRunner`] to produce a report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("test runner failed: {reason}")]
pub struct RunnerError {
    /// Failure description.
    pub reason: String,
}

impl RunnerError {
    /// Creates a runner error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Counts reported by a test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestReport {
    /// Tests discovered.
    pub tests_run: usize,
    /// Tests that passed.
    pub passed: usize,
    /// Tests that failed.
    pub failed: usize,
}

/// Executes a test suite against target code.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Short label recorded in result details.
    fn name(&self) -> &'static str;

    /// Runs `test_code` against `target_code`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the suite could not be executed.
    async fn run(&self, test_code: &str, target_code: &str) -> Result<TestReport, RunnerError>;
}

/// Runner that only checks the suite declares test functions.
///
/// The suite is parsed like any other fragment: a file, or failing that a
/// statement block. Every discovered `#[test]` (including `#[tokio::test]`) function is
/// reported as passing; nothing is executed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticTestRunner;

#[async_trait]
impl TestRunner for StaticTestRunner {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn run(&self, test_code: &str, _target_code: &str) -> Result<TestReport, RunnerError> {
        let suite = Source::parse(test_code).map_err(|err| RunnerError::new(err.to_string()))?;
        let mut finder = TestFinder::default();
        suite.accept(&mut finder);
        Ok(TestReport {
            tests_run: finder.tests,
            passed: finder.tests,
            failed: 0,
        })
    }
}

#[derive(Default)]
struct TestFinder {
    tests: usize,
}

impl<'ast> Visit<'ast> for TestFinder {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let is_test = node.attrs.iter().any(|attr| {
            attr.path()
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "test")
        });
        if is_test {
            self.tests += 1;
        }
        visit::visit_item_fn(self, node);
    }
}
