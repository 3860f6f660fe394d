//! Active and historical proposals.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gate_primitives::ProposalId;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::proposal::Proposal;
use crate::vote::VoteResult;

/// Status reported by [`Parliament::vote_status`](crate::Parliament::vote_status).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteStatus {
    /// Votes are still being collected.
    Voting {
        /// The proposal, including its deadline.
        proposal: Proposal,
    },
    /// The proposal has a terminal result.
    Completed {
        /// The terminal result.
        result: VoteResult,
    },
    /// No proposal has this id.
    NotFound,
}

impl VoteStatus {
    /// Terminal result, if completed.
    #[must_use]
    pub fn result(&self) -> Option<&VoteResult> {
        match self {
            Self::Completed { result } => Some(result),
            _ => None,
        }
    }
}

pub(crate) struct ActiveProposal {
    pub(crate) proposal: Proposal,
    pub(crate) round: JoinHandle<Option<()>>,
}

/// Proposals indexed by id; each is either active or historical, never both.
#[derive(Default)]
pub(crate) struct ProposalBook {
    active: HashMap<ProposalId, ActiveProposal>,
    history: HashMap<ProposalId, VoteResult>,
}

impl ProposalBook {
    pub(crate) fn activate(&mut self, proposal: Proposal, round: JoinHandle<Option<()>>) {
        self.active
            .insert(proposal.id, ActiveProposal { proposal, round });
    }

    /// Moves an active proposal to history. Returns `None`, leaving the book
    /// untouched, when the proposal is not active.
    pub(crate) fn complete(
        &mut self,
        id: ProposalId,
        result: VoteResult,
    ) -> Option<ActiveProposal> {
        let entry = self.active.remove(&id)?;
        self.history.insert(id, result);
        Some(entry)
    }

    pub(crate) fn is_completed(&self, id: ProposalId) -> bool {
        self.history.contains_key(&id)
    }

    pub(crate) fn status(&self, id: ProposalId) -> VoteStatus {
        if let Some(entry) = self.active.get(&id) {
            return VoteStatus::Voting {
                proposal: entry.proposal.clone(),
            };
        }
        match self.history.get(&id) {
            Some(result) => VoteStatus::Completed {
                result: result.clone(),
            },
            None => VoteStatus::NotFound,
        }
    }

    pub(crate) fn active_ids(&self) -> Vec<ProposalId> {
        self.active.keys().copied().collect()
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Drops results decided at or before `cutoff`. Active proposals are kept.
    pub(crate) fn prune_history(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.history.len();
        self.history.retain(|_, result| result.decided_at > cutoff);
        before - self.history.len()
    }
}
