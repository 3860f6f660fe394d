//! Ballots and the weighted tally.

use chrono::{DateTime, Utc};
use gate_primitives::{MemberId, ProposalId};
use serde::{Deserialize, Serialize};

use crate::error::{ParliamentError, ParliamentResult};
use crate::member::Parliamentarian;

/// One member's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    /// In favour.
    Approve,
    /// Against.
    Deny,
    /// No opinion; also recorded for members that did not respond.
    Abstain,
    /// Defer to a higher authority.
    Escalate,
}

/// A member's recorded vote, weighted by their voting power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    /// Voting member.
    pub member_id: MemberId,
    /// Member's voting power at tally time.
    pub weight: f64,
    /// Recorded vote.
    pub value: VoteValue,
    /// `false` when the member timed out or failed; the vote is then an abstention.
    pub responded: bool,
}

impl Ballot {
    /// A vote the member actually cast.
    #[must_use]
    pub fn cast(member: &Parliamentarian, value: VoteValue) -> Self {
        Self {
            member_id: member.id(),
            weight: member.voting_power(),
            value,
            responded: true,
        }
    }

    /// An abstention recorded for a member that did not respond.
    #[must_use]
    pub fn missing(member: &Parliamentarian) -> Self {
        Self {
            member_id: member.id(),
            weight: member.voting_power(),
            value: VoteValue::Abstain,
            responded: false,
        }
    }
}

/// Terminal committee decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDecision {
    /// The proposal may proceed.
    Approved,
    /// The proposal is rejected.
    Denied,
    /// Deferred to a higher authority.
    Escalated,
}

/// Quorum and threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyRules {
    /// Fraction of members that must respond for the tally to be decisive.
    pub quorum_required: f64,
    /// Weighted approve fraction needed for approval.
    pub approval_threshold: f64,
    /// Share of cast votes that must be escalations to escalate on their own.
    pub escalation_share: f64,
}

impl Default for TallyRules {
    fn default() -> Self {
        Self {
            quorum_required: 0.5,
            approval_threshold: 0.6,
            escalation_share: 0.3,
        }
    }
}

impl TallyRules {
    /// Checks every fraction is within `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> ParliamentResult<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.quorum_required) {
            return Err(ParliamentError::InvalidConfig(
                "quorum_required must be within [0, 1]",
            ));
        }
        if !unit.contains(&self.approval_threshold) {
            return Err(ParliamentError::InvalidConfig(
                "approval_threshold must be within [0, 1]",
            ));
        }
        if !unit.contains(&self.escalation_share) {
            return Err(ParliamentError::InvalidConfig(
                "escalation_share must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Terminal outcome of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResult {
    /// Proposal voted on.
    pub proposal_id: ProposalId,
    /// Ballots recorded, including non-responders.
    pub total_votes: usize,
    /// Ballots from members that responded.
    pub votes_cast: usize,
    /// Approve ballots.
    pub approve_votes: usize,
    /// Deny ballots.
    pub deny_votes: usize,
    /// Abstain ballots, including non-responders.
    pub abstain_votes: usize,
    /// Escalate ballots.
    pub escalate_votes: usize,
    /// Approve weight over responding weight.
    pub approve_fraction: f64,
    /// Deny weight over responding weight.
    pub deny_fraction: f64,
    /// Whether enough members responded.
    pub quorum_met: bool,
    /// Terminal decision.
    pub decision: VoteDecision,
    /// Confidence in the decision.
    pub confidence: f64,
    /// Short explanation.
    pub reason: String,
    /// Tally time.
    pub decided_at: DateTime<Utc>,
}

impl VoteResult {
    /// Result recorded when a round is cancelled before tallying.
    #[must_use]
    pub fn cancelled(proposal_id: ProposalId) -> Self {
        Self {
            proposal_id,
            total_votes: 0,
            votes_cast: 0,
            approve_votes: 0,
            deny_votes: 0,
            abstain_votes: 0,
            escalate_votes: 0,
            approve_fraction: 0.0,
            deny_fraction: 0.0,
            quorum_met: false,
            decision: VoteDecision::Escalated,
            confidence: 0.5,
            reason: "voting cancelled".into(),
            decided_at: Utc::now(),
        }
    }
}

/// Tallies `ballots` from a committee of `total_members`.
///
/// Ties and ambiguous splits resolve to escalation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tally(
    proposal_id: ProposalId,
    ballots: &[Ballot],
    total_members: usize,
    rules: &TallyRules,
) -> VoteResult {
    let count = |value: VoteValue| ballots.iter().filter(|b| b.value == value).count();
    let responded = || ballots.iter().filter(|b| b.responded);

    let votes_cast = responded().count();
    let escalate_votes = count(VoteValue::Escalate);
    let quorum_met = votes_cast as f64 >= total_members as f64 * rules.quorum_required;

    let total_weight: f64 = responded().map(|b| b.weight).sum();
    let weight_of = |value: VoteValue| -> f64 {
        responded()
            .filter(|b| b.value == value)
            .map(|b| b.weight)
            .sum()
    };
    let (approve_fraction, deny_fraction) = if total_weight > 0.0 {
        (
            (weight_of(VoteValue::Approve) / total_weight).clamp(0.0, 1.0),
            (weight_of(VoteValue::Deny) / total_weight).clamp(0.0, 1.0),
        )
    } else {
        (0.0, 0.0)
    };
    let escalate_share = if votes_cast == 0 {
        0.0
    } else {
        escalate_votes as f64 / votes_cast as f64
    };

    let (decision, confidence, reason) = if !quorum_met {
        (VoteDecision::Escalated, 0.5, "quorum not met")
    } else if total_weight > 0.0 && approve_fraction >= rules.approval_threshold {
        (VoteDecision::Approved, approve_fraction, "approval threshold reached")
    } else if deny_fraction > approve_fraction {
        (VoteDecision::Denied, deny_fraction, "deny majority")
    } else if escalate_share > rules.escalation_share {
        (VoteDecision::Escalated, escalate_share, "members requested escalation")
    } else {
        (VoteDecision::Escalated, 0.5, "no decisive majority")
    };

    VoteResult {
        proposal_id,
        total_votes: ballots.len(),
        votes_cast,
        approve_votes: count(VoteValue::Approve),
        deny_votes: count(VoteValue::Deny),
        abstain_votes: count(VoteValue::Abstain),
        escalate_votes,
        approve_fraction,
        deny_fraction,
        quorum_met,
        decision,
        confidence,
        reason: reason.into(),
        decided_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ballot(value: VoteValue, weight: f64, responded: bool) -> Ballot {
        Ballot {
            member_id: MemberId::random(),
            weight,
            value,
            responded,
        }
    }

    fn full(values: &[VoteValue]) -> Vec<Ballot> {
        values.iter().map(|v| ballot(*v, 1.0, true)).collect()
    }

    #[test]
    fn below_quorum_escalates_at_half_confidence() {
        let mut ballots = full(&[VoteValue::Approve; 3]);
        ballots.extend((0..4).map(|_| ballot(VoteValue::Abstain, 1.0, false)));

        let result = tally(ProposalId::random(), &ballots, 7, &TallyRules::default());

        assert!(!result.quorum_met);
        assert_eq!(result.decision, VoteDecision::Escalated);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.total_votes, 7);
        assert_eq!(result.votes_cast, 3);
        assert_eq!(result.abstain_votes, 4);
    }

    #[test]
    fn five_of_seven_approvals_pass() {
        use VoteValue::{Abstain, Approve};
        let ballots = full(&[Approve, Approve, Approve, Approve, Approve, Abstain, Abstain]);

        let result = tally(ProposalId::random(), &ballots, 7, &TallyRules::default());

        assert_eq!(result.decision, VoteDecision::Approved);
        assert!((result.approve_fraction - 5.0 / 7.0).abs() < 1e-9);
        assert!((result.confidence - result.approve_fraction).abs() < f64::EPSILON);
    }

    #[test]
    fn deny_majority_denies() {
        use VoteValue::{Abstain, Approve, Deny};
        let ballots = full(&[Deny, Deny, Deny, Approve, Abstain]);

        let result = tally(ProposalId::random(), &ballots, 5, &TallyRules::default());

        assert_eq!(result.decision, VoteDecision::Denied);
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn escalation_share_sets_confidence() {
        use VoteValue::{Abstain, Approve, Escalate};
        let ballots = full(&[Escalate, Escalate, Approve, Abstain, Abstain]);

        let result = tally(ProposalId::random(), &ballots, 5, &TallyRules::default());

        assert_eq!(result.decision, VoteDecision::Escalated);
        assert!((result.confidence - 0.4).abs() < 1e-9);
        assert_eq!(result.reason, "members requested escalation");
    }

    #[test]
    fn weights_scale_fractions() {
        use VoteValue::{Approve, Deny};
        let ballots = vec![ballot(Approve, 0.9, true), ballot(Deny, 0.3, true)];

        let result = tally(ProposalId::random(), &ballots, 2, &TallyRules::default());

        assert_eq!(result.decision, VoteDecision::Approved);
        assert!((result.approve_fraction - 0.75).abs() < 1e-9);
    }

    #[test]
    fn rejects_invalid_rules() {
        let rules = TallyRules {
            quorum_required: 1.5,
            ..TallyRules::default()
        };
        assert!(rules.validate().is_err());
        assert!(TallyRules::default().validate().is_ok());
    }

    fn arb_value() -> impl Strategy<Value = VoteValue> {
        prop_oneof![
            Just(VoteValue::Approve),
            Just(VoteValue::Deny),
            Just(VoteValue::Abstain),
            Just(VoteValue::Escalate),
        ]
    }

    fn arb_ballot() -> impl Strategy<Value = Ballot> {
        (arb_value(), 0.01f64..=1.0, any::<bool>()).prop_map(|(value, weight, responded)| {
            let value = if responded { value } else { VoteValue::Abstain };
            ballot(value, weight, responded)
        })
    }

    proptest! {
        #[test]
        fn quorum_law(ballots in prop::collection::vec(arb_ballot(), 1..12), quorum in 0.0f64..=1.0) {
            let rules = TallyRules { quorum_required: quorum, ..TallyRules::default() };
            let result = tally(ProposalId::random(), &ballots, ballots.len(), &rules);
            #[allow(clippy::cast_precision_loss)]
            let below = (result.votes_cast as f64) < ballots.len() as f64 * quorum;
            if below {
                prop_assert_eq!(result.decision, VoteDecision::Escalated);
                prop_assert!((result.confidence - 0.5).abs() < f64::EPSILON);
            }
        }

        #[test]
        fn fractions_are_bounded(ballots in prop::collection::vec(arb_ballot(), 1..12)) {
            let result = tally(ProposalId::random(), &ballots, ballots.len(), &TallyRules::default());
            prop_assert!((0.0..=1.0).contains(&result.approve_fraction));
            prop_assert!((0.0..=1.0).contains(&result.deny_fraction));
            prop_assert!(result.approve_fraction + result.deny_fraction <= 1.0 + 1e-9);
            prop_assert_eq!(result.total_votes, ballots.len());
        }

        #[test]
        fn ties_escalate(pairs in 1usize..4, abstentions in 0usize..4) {
            let mut ballots = full(&vec![VoteValue::Approve; pairs]);
            ballots.extend(full(&vec![VoteValue::Deny; pairs]));
            ballots.extend(full(&vec![VoteValue::Abstain; abstentions]));
            let result = tally(ProposalId::random(), &ballots, ballots.len(), &TallyRules::default());
            prop_assert_eq!(result.decision, VoteDecision::Escalated);
        }

        #[test]
        fn threshold_law(approvals in 3usize..8, others in 0usize..2) {
            let mut ballots = full(&vec![VoteValue::Approve; approvals]);
            ballots.extend(full(&vec![VoteValue::Deny; others]));
            let result = tally(ProposalId::random(), &ballots, ballots.len(), &TallyRules::default());
            prop_assert_eq!(result.decision, VoteDecision::Approved);
        }
    }
}
