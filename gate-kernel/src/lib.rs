//! Governance gate orchestration.
//!
//! [`GovernanceGate::evaluate`] runs an action through the constitution,
//! then verification when the action is risky or touches code, then a
//! parliamentary vote when the review or a critical tier demands one. Any
//! stage may deny; the constitution and parliament may escalate, which opens
//! a [`PendingApproval`] for a human.

#![warn(missing_docs, clippy::pedantic)]

mod approvals;
pub mod decision;
mod error;
mod gate;
pub mod lifecycle;
mod stats;

pub use approvals::{ApprovalStatus, PendingApproval};
pub use decision::{Decision, Outcome, ProcessingStep};
pub use error::{GateError, GateResult};
pub use gate::{CONSTITUTION_CONFIDENCE, GovernanceGate, VERIFICATION_CONFIDENCE};
pub use lifecycle::{GateState, Lifecycle, LifecycleError, LifecycleEvent};
pub use stats::GateStats;
