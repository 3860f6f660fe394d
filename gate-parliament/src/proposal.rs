//! Proposals submitted to the committee.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gate_primitives::{ProposalId, RiskLevel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a proposal asks the committee to allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// New capability.
    Feature,
    /// Change to governance itself.
    Governance,
    /// One-off autonomous action.
    #[default]
    Action,
    /// Code change.
    Code,
    /// Release or rollout.
    Deployment,
}

/// Caller input for [`Parliament::submit_proposal`](crate::Parliament::submit_proposal).
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRequest {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) proposer: String,
    pub(crate) kind: ProposalKind,
    pub(crate) risk_level: RiskLevel,
    pub(crate) details: Map<String, Value>,
    pub(crate) timeout: Option<Duration>,
}

impl ProposalRequest {
    /// Starts a request with an empty description and the `system` proposer.
    #[must_use]
    pub fn new(title: impl Into<String>, kind: ProposalKind, risk_level: RiskLevel) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            proposer: "system".into(),
            kind,
            risk_level,
            details: Map::new(),
            timeout: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets who is asking.
    #[must_use]
    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = proposer.into();
        self
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Overrides the committee-wide voting timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Who is asking.
    #[must_use]
    pub fn proposer(&self) -> &str {
        &self.proposer
    }
}

/// A proposal under or after committee review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Identifier.
    pub id: ProposalId,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Who submitted it.
    pub proposer: String,
    /// Proposal kind.
    pub kind: ProposalKind,
    /// Risk of the underlying action.
    pub risk_level: RiskLevel,
    /// Structured details.
    pub details: Map<String, Value>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Time after which outstanding votes are abstentions.
    pub voting_deadline: DateTime<Utc>,
}

impl Proposal {
    pub(crate) fn from_request(request: ProposalRequest, timeout: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: ProposalId::random(),
            title: request.title,
            description: request.description,
            proposer: request.proposer,
            kind: request.kind,
            risk_level: request.risk_level,
            details: request.details,
            created_at,
            voting_deadline: chrono::Duration::from_std(timeout)
                .ok()
                .and_then(|window| created_at.checked_add_signed(window))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}
