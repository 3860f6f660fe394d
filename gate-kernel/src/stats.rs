use serde::{Deserialize, Serialize};

use crate::decision::Outcome;

/// Running totals across evaluations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GateStats {
    /// Evaluations completed.
    pub total_requests: u64,
    /// Approved outcomes.
    pub approved: u64,
    /// Denied outcomes.
    pub denied: u64,
    /// Escalated outcomes.
    pub escalated: u64,
    /// Error outcomes.
    pub errors: u64,
    /// Rolling mean processing time, in milliseconds.
    pub average_processing_ms: f64,
}

impl GateStats {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn record(&mut self, outcome: Outcome, processing_ms: u64) {
        self.total_requests += 1;
        match outcome {
            Outcome::Approved => self.approved += 1,
            Outcome::Denied => self.denied += 1,
            Outcome::Escalated => self.escalated += 1,
            Outcome::Error => self.errors += 1,
        }
        let delta = processing_ms as f64 - self.average_processing_ms;
        self.average_processing_ms += delta / self.total_requests as f64;
    }
}
