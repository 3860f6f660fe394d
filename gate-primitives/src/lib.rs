//! Core shared types for the governance gate.

#![warn(missing_docs, clippy::pedantic)]

mod action;
mod error;
mod evidence;
mod ids;

/// Action descriptors submitted for governance review.
pub use action::{ActionDescriptor, ActionFlags, RiskLevel, TierName, VerificationInputs};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Weighted evidence backing a hypothesis.
pub use evidence::Evidence;
/// Unique identifiers for requests, proposals, members, and approvals.
pub use ids::{ApprovalId, MemberId, ProposalId, RequestId};
