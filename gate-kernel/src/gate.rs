//! The governance gate pipeline.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use gate_config::{GateSettings, GovernanceSettings};
use gate_constitution::Constitution;
use gate_parliament::{
    Parliament, ParliamentError, ProposalKind, ProposalRequest, VoteDecision, VoteResult, VoteStatus,
};
use gate_primitives::{ActionDescriptor, ApprovalId, ProposalId, RequestId, RiskLevel};
use gate_telemetry::{AuditRecord, AuditSink, EventNotifier, append_or_warn};
use gate_verification::VerificationEngine;
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::approvals::{ApprovalQueue, ApprovalStatus, PendingApproval};
use crate::decision::{Decision, Outcome, ProcessingStep, Trail};
use crate::error::{GateError, GateResult};
use crate::lifecycle::{GateState, Lifecycle, LifecycleError, LifecycleEvent};
use crate::stats::GateStats;

const ACTOR: &str = "governance_gate";
/// Stage confidence contributed by a passing constitutional review.
pub const CONSTITUTION_CONFIDENCE: f64 = 0.9;
/// Stage confidence contributed by passing verification checks.
pub const VERIFICATION_CONFIDENCE: f64 = 0.8;
/// Confidence of an escalation caused by the parliamentary wait running out.
const TIMEOUT_CONFIDENCE: f64 = 0.5;

/// Orchestrates constitution, verification, and parliament into one decision.
///
/// Call [`init`](Self::init) before evaluating; evaluations on a gate that is
/// not running yield [`Outcome::Error`].
pub struct GovernanceGate {
    constitution: Constitution,
    verification: Arc<VerificationEngine>,
    parliament: Parliament,
    settings: GateSettings,
    lifecycle: RwLock<Lifecycle>,
    stats: Mutex<GateStats>,
    approvals: Mutex<ApprovalQueue>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl fmt::Debug for GovernanceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GovernanceGate")
            .field("constitution", &self.constitution)
            .field("verification", &self.verification)
            .field("parliament", &self.parliament)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for GovernanceGate {
    fn default() -> Self {
        Self::new(
            Constitution::default(),
            VerificationEngine::default(),
            Parliament::default(),
        )
    }
}

impl GovernanceGate {
    /// Assembles a gate from its components with default timing.
    #[must_use]
    pub fn new(
        constitution: Constitution,
        verification: VerificationEngine,
        parliament: Parliament,
    ) -> Self {
        Self {
            constitution,
            verification: Arc::new(verification),
            parliament,
            settings: GateSettings::default(),
            lifecycle: RwLock::new(Lifecycle::default()),
            stats: Mutex::new(GateStats::default()),
            approvals: Mutex::new(ApprovalQueue::default()),
            audit: None,
        }
    }

    /// Builds every component from `settings`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error.
    pub fn from_settings(settings: &GovernanceSettings) -> GateResult<Self> {
        settings.validate()?;
        let constitution = Constitution::new(settings.rule_set()?);
        let verification = VerificationEngine::new(settings.verification.clone())?;
        let parliament = Parliament::new(settings.parliament.clone())?;
        Ok(Self::new(constitution, verification, parliament).with_settings(settings.gate.clone()))
    }

    /// Replaces the parliamentary wait timing.
    #[must_use]
    pub fn with_settings(mut self, settings: GateSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sends audit records from every component to `sink`.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.constitution = self.constitution.with_audit_sink(Arc::clone(&sink));
        self.parliament = self.parliament.with_audit_sink(Arc::clone(&sink));
        self.audit = Some(sink);
        self
    }

    /// Publishes completed votes to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.parliament = self.parliament.with_notifier(notifier);
        self
    }

    /// The constitution.
    #[must_use]
    pub fn constitution(&self) -> &Constitution {
        &self.constitution
    }

    /// The verification engine.
    #[must_use]
    pub fn verification(&self) -> &VerificationEngine {
        &self.verification
    }

    /// The parliament.
    #[must_use]
    pub fn parliament(&self) -> &Parliament {
        &self.parliament
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> GateState {
        self.lifecycle.read().await.state()
    }

    /// Starts accepting requests.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Lifecycle`] unless the gate is freshly constructed.
    pub async fn init(&self) -> GateResult<()> {
        self.lifecycle.write().await.transition(LifecycleEvent::Start)?;
        info!("governance gate running");
        Ok(())
    }

    /// Stops accepting requests and cancels outstanding votes.
    ///
    /// # Errors
    ///
    /// Lifecycle errors are not expected; stopping is always allowed.
    pub async fn shutdown(&self) -> GateResult<()> {
        self.lifecycle.write().await.transition(LifecycleEvent::Stop)?;
        let cancelled = self.parliament.shutdown().await;
        info!(cancelled, "governance gate stopped");
        Ok(())
    }

    /// Snapshot of running totals.
    pub async fn stats(&self) -> GateStats {
        *self.stats.lock().await
    }

    /// Runs `action` through the pipeline. Never fails: internal errors and
    /// panics become [`Outcome::Error`] decisions.
    pub async fn evaluate(&self, action: &ActionDescriptor, context: &Map<String, Value>) -> Decision {
        let request_id = RequestId::random();
        let started = Instant::now();
        debug!(%request_id, action = %action.label(), "evaluating action");

        let outcome = AssertUnwindSafe(self.run_pipeline(request_id, action, context))
            .catch_unwind()
            .await;
        let decision = match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(err)) => {
                warn!(%request_id, %err, "governance evaluation failed");
                Decision::error(request_id, err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(%request_id, %message, "governance evaluation panicked");
                Decision::error(request_id, format!("internal panic: {message}"))
            }
        };
        self.finish(decision, &action.label(), started).await
    }

    /// Approves low-risk actions immediately; otherwise runs [`evaluate`](Self::evaluate).
    pub async fn quick_check(&self, action_name: &str, risk_level: RiskLevel) -> Decision {
        if risk_level != RiskLevel::Low {
            let action = ActionDescriptor::new(action_name).with_risk_level(risk_level);
            return self.evaluate(&action, &Map::new()).await;
        }

        let request_id = RequestId::random();
        let started = Instant::now();
        let decision = match self.ensure_running().await {
            Ok(()) => {
                let mut trail = Trail::default();
                trail.step(ProcessingStep::QuickCheck);
                trail.note("low risk action approved by quick check");
                trail.conclude(request_id, Outcome::Approved, CONSTITUTION_CONFIDENCE)
            }
            Err(err) => Decision::error(request_id, err.to_string()),
        };
        self.finish(decision, action_name, started).await
    }

    /// Looks up an approval; `None` when unknown.
    pub async fn approval_status(&self, id: ApprovalId) -> Option<PendingApproval> {
        self.approvals.lock().await.get(id)
    }

    /// Approvals still awaiting a human, oldest first.
    pub async fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.approvals.lock().await.pending()
    }

    /// Forgets approvals that have been approved or rejected. Returns how many
    /// were dropped; their ids are unknown afterwards.
    pub async fn prune_resolved_approvals(&self) -> usize {
        let pruned = self.approvals.lock().await.prune_resolved();
        debug!(pruned, "resolved approvals pruned");
        pruned
    }

    /// Allows an escalated action.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::ApprovalNotFound`] for an unknown id and
    /// [`GateError::ApprovalResolved`] if it was already resolved.
    pub async fn approve(
        &self,
        id: ApprovalId,
        approver: &str,
        note: Option<String>,
    ) -> GateResult<PendingApproval> {
        self.resolve(id, ApprovalStatus::Approved, approver, note).await
    }

    /// Refuses an escalated action.
    ///
    /// # Errors
    ///
    /// Same as [`approve`](Self::approve).
    pub async fn reject(
        &self,
        id: ApprovalId,
        approver: &str,
        note: Option<String>,
    ) -> GateResult<PendingApproval> {
        self.resolve(id, ApprovalStatus::Rejected, approver, note).await
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        status: ApprovalStatus,
        approver: &str,
        note: Option<String>,
    ) -> GateResult<PendingApproval> {
        let resolved = self
            .approvals
            .lock()
            .await
            .resolve(id, status, approver, note)?;
        info!(approval_id = %id, ?status, approver, "approval resolved");
        append_or_warn(
            self.audit.as_ref(),
            AuditRecord::new(ACTOR, "approval_resolved", id.to_string())
                .with_payload(serde_json::to_value(&resolved).unwrap_or_default())
                .with_result(if status == ApprovalStatus::Approved {
                    "approved"
                } else {
                    "rejected"
                }),
        )
        .await;
        Ok(resolved)
    }

    async fn ensure_running(&self) -> GateResult<()> {
        match self.state().await {
            GateState::Running => Ok(()),
            state => Err(LifecycleError::NotRunning(state).into()),
        }
    }

    async fn run_pipeline(
        &self,
        request_id: RequestId,
        action: &ActionDescriptor,
        context: &Map<String, Value>,
    ) -> GateResult<Decision> {
        self.ensure_running().await?;
        let mut trail = Trail::default();

        trail.step(ProcessingStep::ConstitutionalReview);
        let review = self.constitution.review(action, context).await;
        if !review.validation.passed() {
            trail.note("failed constitutional validation");
            for violation in review.validation.violations() {
                trail.note(format!("{}: {}", violation.rule_id, violation.message));
            }
            trail.review = Some(review);
            return Ok(trail.conclude(request_id, Outcome::Denied, CONSTITUTION_CONFIDENCE));
        }
        trail.note("constitutional validation passed");
        trail.contribute(CONSTITUTION_CONFIDENCE);
        let requires_parliament = review.requires_parliament;
        trail.review = Some(review);

        if requires_verification(action) {
            trail.step(ProcessingStep::Verification);
            let results = self
                .verification
                .verify_inputs(action.verification(), context)
                .await;
            let failures: Vec<String> = results
                .iter()
                .filter(|result| !result.is_passed())
                .map(|result| {
                    format!(
                        "{} check on {} failed{}",
                        result.check_type(),
                        result.target(),
                        result.error().map(|e| format!(": {e}")).unwrap_or_default()
                    )
                })
                .collect();
            let ran = !results.is_empty();
            trail.verification = results;
            if !failures.is_empty() {
                trail.note("failed verification checks");
                for failure in failures {
                    trail.note(failure);
                }
                return Ok(trail.conclude(request_id, Outcome::Denied, VERIFICATION_CONFIDENCE));
            }
            if ran {
                trail.note("verification checks passed");
                trail.contribute(VERIFICATION_CONFIDENCE);
            } else {
                trail.note("verification required but no verification inputs supplied");
            }
        }

        if requires_parliament || action.governance_tier().is_critical() {
            trail.step(ProcessingStep::ParliamentaryReview);
            let proposal = self
                .parliament
                .submit_proposal(proposal_for(action, context))
                .await?;
            let Some(result) = self.await_vote(proposal).await? else {
                if let Err(err) = self.parliament.cancel_proposal(proposal).await {
                    debug!(proposal_id = %proposal, %err, "proposal finished while cancelling");
                }
                trail.note("parliamentary voting timeout");
                return Ok(trail.conclude(request_id, Outcome::Escalated, TIMEOUT_CONFIDENCE));
            };
            let confidence = result.confidence;
            let decision = result.decision;
            trail.note(format!("parliament {}: {}", decision_label(decision), result.reason));
            trail.vote = Some(result);
            match decision {
                VoteDecision::Denied => {
                    return Ok(trail.conclude(request_id, Outcome::Denied, confidence));
                }
                VoteDecision::Escalated => {
                    return Ok(trail.conclude(request_id, Outcome::Escalated, confidence));
                }
                VoteDecision::Approved => trail.contribute(confidence),
            }
        }

        trail.step(ProcessingStep::FinalDecision);
        trail.note("all required governance stages passed");
        let confidence = trail.aggregate_confidence();
        Ok(trail.conclude(request_id, Outcome::Approved, confidence))
    }

    /// Polls until the vote completes; `None` once the wait budget is spent.
    async fn await_vote(&self, id: ProposalId) -> GateResult<Option<VoteResult>> {
        let poll_interval = self.settings.poll_interval();
        let poll = async {
            loop {
                match self.parliament.vote_status(id).await {
                    VoteStatus::Completed { result } => return Ok(result),
                    VoteStatus::Voting { .. } => tokio::time::sleep(poll_interval).await,
                    VoteStatus::NotFound => {
                        return Err(GateError::from(ParliamentError::ProposalNotFound(id)));
                    }
                }
            }
        };
        match tokio::time::timeout(self.settings.wait_budget(), poll).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                warn!(proposal_id = %id, budget = ?self.settings.wait_budget(), "parliamentary wait budget exhausted");
                Ok(None)
            }
        }
    }

    async fn finish(&self, mut decision: Decision, action: &str, started: Instant) -> Decision {
        decision.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if decision.outcome == Outcome::Escalated {
            let reason = decision.reasoning.last().cloned().unwrap_or_default();
            let id = self
                .approvals
                .lock()
                .await
                .open(decision.request_id, action.to_owned(), reason);
            decision.approval_id = Some(id);
        }

        self.stats
            .lock()
            .await
            .record(decision.outcome, decision.processing_time_ms);

        match decision.outcome {
            Outcome::Approved => info!(
                request_id = %decision.request_id,
                action,
                confidence = decision.confidence,
                elapsed_ms = decision.processing_time_ms,
                "action approved"
            ),
            outcome => warn!(
                request_id = %decision.request_id,
                action,
                %outcome,
                reason = decision.reasoning.first().map_or("", String::as_str),
                "action not approved"
            ),
        }

        append_or_warn(
            self.audit.as_ref(),
            AuditRecord::new(ACTOR, "final_decision", decision.request_id.to_string())
                .with_payload(json!({
                    "action": action,
                    "confidence": decision.confidence,
                    "processing_steps": decision.processing_steps,
                    "reasoning": decision.reasoning,
                    "approval_id": decision.approval_id,
                }))
                .with_result(decision.outcome.as_str()),
        )
        .await;
        decision
    }
}

/// Verification runs for elevated tiers, high risk, and code or deployment actions.
fn requires_verification(action: &ActionDescriptor) -> bool {
    action.governance_tier().is_elevated() || action.risk_level().is_high() || action.touches_code()
}

fn proposal_kind(action_type: &str) -> ProposalKind {
    let action_type = action_type.to_ascii_lowercase();
    if action_type.contains("deploy") {
        ProposalKind::Deployment
    } else if action_type.contains("code") {
        ProposalKind::Code
    } else if action_type.contains("feature") {
        ProposalKind::Feature
    } else if action_type.contains("governance") {
        ProposalKind::Governance
    } else {
        ProposalKind::Action
    }
}

fn proposal_for(action: &ActionDescriptor, context: &Map<String, Value>) -> ProposalRequest {
    let proposer = context
        .get("requester")
        .or_else(|| action.context().get("requester"))
        .and_then(Value::as_str)
        .unwrap_or(ACTOR);
    let mut details = Map::new();
    details.insert(
        "action".into(),
        serde_json::to_value(action).unwrap_or_default(),
    );
    if !context.is_empty() {
        details.insert("context".into(), Value::Object(context.clone()));
    }
    ProposalRequest::new(
        action.label(),
        proposal_kind(action.action_type()),
        action.risk_level(),
    )
    .with_description(format!(
        "governance review of {} at tier {}",
        action.label(),
        action.governance_tier()
    ))
    .with_proposer(proposer)
    .with_details(details)
}

fn decision_label(decision: VoteDecision) -> &'static str {
    match decision {
        VoteDecision::Approved => "approved",
        VoteDecision::Denied => "denied",
        VoteDecision::Escalated => "escalated",
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
