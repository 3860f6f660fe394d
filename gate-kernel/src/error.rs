use gate_config::ConfigError;
use gate_constitution::ConstitutionError;
use gate_parliament::ParliamentError;
use gate_primitives::ApprovalId;
use gate_verification::VerificationError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Errors raised by the governance gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// Lifecycle violation, including use while not running.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// No pending approval has this id.
    #[error("approval {0} not found")]
    ApprovalNotFound(ApprovalId),
    /// The approval was already approved or rejected.
    #[error("approval {0} already resolved")]
    ApprovalResolved(ApprovalId),
    /// Parliament failure.
    #[error(transparent)]
    Parliament(#[from] ParliamentError),
    /// Constitution construction failure.
    #[error(transparent)]
    Constitution(#[from] ConstitutionError),
    /// Verification construction failure.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
