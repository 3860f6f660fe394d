//! Human approvals for escalated decisions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gate_primitives::{ApprovalId, RequestId};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

/// Where a pending approval stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// A human allowed the action.
    Approved,
    /// A human refused the action.
    Rejected,
}

/// An escalated decision awaiting a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Identifier.
    pub id: ApprovalId,
    /// Evaluation that escalated.
    pub request_id: RequestId,
    /// Label of the escalated action.
    pub action: String,
    /// Why the gate escalated.
    pub reason: String,
    /// Current status.
    pub status: ApprovalStatus,
    /// When the approval was opened.
    pub created_at: DateTime<Utc>,
    /// Who resolved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// Resolver's note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When it was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct ApprovalQueue {
    entries: HashMap<ApprovalId, PendingApproval>,
}

impl ApprovalQueue {
    pub(crate) fn open(&mut self, request_id: RequestId, action: String, reason: String) -> ApprovalId {
        let id = ApprovalId::random();
        self.entries.insert(
            id,
            PendingApproval {
                id,
                request_id,
                action,
                reason,
                status: ApprovalStatus::Pending,
                created_at: Utc::now(),
                resolved_by: None,
                note: None,
                resolved_at: None,
            },
        );
        id
    }

    pub(crate) fn resolve(
        &mut self,
        id: ApprovalId,
        status: ApprovalStatus,
        resolver: &str,
        note: Option<String>,
    ) -> GateResult<PendingApproval> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(GateError::ApprovalNotFound(id))?;
        if entry.status != ApprovalStatus::Pending {
            return Err(GateError::ApprovalResolved(id));
        }
        entry.status = status;
        entry.resolved_by = Some(resolver.to_owned());
        entry.note = note;
        entry.resolved_at = Some(Utc::now());
        Ok(entry.clone())
    }

    pub(crate) fn get(&self, id: ApprovalId) -> Option<PendingApproval> {
        self.entries.get(&id).cloned()
    }

    pub(crate) fn pending(&self) -> Vec<PendingApproval> {
        let mut pending: Vec<_> = self
            .entries
            .values()
            .filter(|entry| entry.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|entry| entry.created_at);
        pending
    }

    /// Drops resolved entries, keeping pending ones. Returns how many were dropped.
    pub(crate) fn prune_resolved(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.status == ApprovalStatus::Pending);
        before - self.entries.len()
    }
}
