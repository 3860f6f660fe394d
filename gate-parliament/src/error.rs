use gate_primitives::ProposalId;
use thiserror::Error;

use crate::scheduler::SchedulerError;

/// Errors raised by the parliament.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParliamentError {
    /// The parliament has been shut down.
    #[error("parliament is shut down")]
    Closed(#[from] SchedulerError),
    /// No active or completed proposal has this id.
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),
    /// The proposal already has a terminal result.
    #[error("proposal {0} already completed")]
    AlreadyCompleted(ProposalId),
    /// Configuration rejected.
    #[error("invalid parliament configuration: {0}")]
    InvalidConfig(&'static str),
    /// A voting policy could not produce a vote.
    #[error("voting policy failed: {reason}")]
    Policy {
        /// Failure description.
        reason: String,
    },
}

/// Result alias for parliament operations.
pub type ParliamentResult<T> = Result<T, ParliamentError>;
