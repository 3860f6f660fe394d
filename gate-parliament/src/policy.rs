//! How members decide their votes.

use async_trait::async_trait;
use gate_primitives::RiskLevel;

use crate::error::ParliamentResult;
use crate::member::{Parliamentarian, Specialty};
use crate::proposal::{Proposal, ProposalKind};
use crate::vote::VoteValue;

/// Produces a member's vote on a proposal.
///
/// Calls are bounded by the committee vote timeout; errors and timeouts are
/// recorded as abstentions.
#[async_trait]
pub trait VotingPolicy: Send + Sync {
    /// Decides how `member` votes on `proposal`.
    async fn vote(&self, member: &Parliamentarian, proposal: &Proposal)
    -> ParliamentResult<VoteValue>;
}

/// Deterministic, specialty-aware default policy.
///
/// Security specialists deny high-risk proposals and innovation specialists
/// approve features. Everyone else approves low risk, escalates high risk
/// and abstains on medium risk. Critical risk counts as high.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecialtyPolicy;

impl SpecialtyPolicy {
    /// Pure form of [`VotingPolicy::vote`].
    #[must_use]
    pub fn decide(specialty: Specialty, kind: ProposalKind, risk: RiskLevel) -> VoteValue {
        match (specialty, kind, risk) {
            (Specialty::Security, _, risk) if risk.is_high() => VoteValue::Deny,
            (Specialty::Innovation, ProposalKind::Feature, _) => VoteValue::Approve,
            (_, _, RiskLevel::Low) => VoteValue::Approve,
            (_, _, RiskLevel::High | RiskLevel::Critical) => VoteValue::Escalate,
            (_, _, RiskLevel::Medium) => VoteValue::Abstain,
        }
    }
}

#[async_trait]
impl VotingPolicy for SpecialtyPolicy {
    async fn vote(
        &self,
        member: &Parliamentarian,
        proposal: &Proposal,
    ) -> ParliamentResult<VoteValue> {
        Ok(Self::decide(member.specialty(), proposal.kind, proposal.risk_level))
    }
}
