//! The voting committee.

use std::fmt;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use gate_primitives::ProposalId;
use gate_telemetry::{AuditRecord, AuditSink, EventNotifier, append_or_warn, publish_or_warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::book::{ProposalBook, VoteStatus};
use crate::error::{ParliamentError, ParliamentResult};
use crate::member::{Parliamentarian, default_roster};
use crate::policy::{SpecialtyPolicy, VotingPolicy};
use crate::proposal::{Proposal, ProposalRequest};
use crate::scheduler::RoundScheduler;
use crate::vote::{Ballot, TallyRules, VoteDecision, VoteResult, tally};

const ACTOR: &str = "parliament";

/// Committee configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParliamentConfig {
    /// Quorum and threshold rules.
    #[serde(flatten)]
    pub rules: TallyRules,
    /// Default voting window for a proposal, in milliseconds.
    pub proposal_timeout_ms: u64,
    /// Upper bound for one member's vote, in milliseconds.
    pub vote_timeout_ms: u64,
    /// Voting rounds allowed to run at once.
    pub max_concurrent_rounds: usize,
}

impl Default for ParliamentConfig {
    fn default() -> Self {
        Self {
            rules: TallyRules::default(),
            proposal_timeout_ms: 3_600_000,
            vote_timeout_ms: 30_000,
            max_concurrent_rounds: 16,
        }
    }
}

impl ParliamentConfig {
    /// Checks the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::InvalidConfig`] for invalid rules, zero timeouts, or zero concurrency.
    pub fn validate(&self) -> ParliamentResult<()> {
        self.rules.validate()?;
        if self.proposal_timeout_ms == 0 || self.vote_timeout_ms == 0 {
            return Err(ParliamentError::InvalidConfig(
                "proposal and vote timeouts must be greater than zero",
            ));
        }
        if self.max_concurrent_rounds == 0 {
            return Err(ParliamentError::InvalidConfig(
                "max_concurrent_rounds must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Default proposal voting window.
    #[must_use]
    pub fn proposal_timeout(&self) -> Duration {
        Duration::from_millis(self.proposal_timeout_ms)
    }

    /// Per-member vote bound.
    #[must_use]
    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }
}

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParliamentStats {
    /// Proposals accepted for voting.
    pub submitted: u64,
    /// Proposals approved.
    pub approved: u64,
    /// Proposals denied.
    pub denied: u64,
    /// Proposals escalated, including cancellations.
    pub escalated: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    approved: AtomicU64,
    denied: AtomicU64,
    escalated: AtomicU64,
}

impl Counters {
    fn record(&self, decision: VoteDecision) {
        let counter = match decision {
            VoteDecision::Approved => &self.approved,
            VoteDecision::Denied => &self.denied,
            VoteDecision::Escalated => &self.escalated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ParliamentStats {
        ParliamentStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            approved: self.approved.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            escalated: self.escalated.load(Ordering::Relaxed),
        }
    }
}

/// Fixed, weighted committee voting on proposals.
///
/// Cloning is cheap; clones share the roster, proposal book, and counters.
#[derive(Clone)]
pub struct Parliament {
    config: ParliamentConfig,
    members: Arc<[Parliamentarian]>,
    policy: Arc<dyn VotingPolicy>,
    book: Arc<Mutex<ProposalBook>>,
    scheduler: RoundScheduler,
    counters: Arc<Counters>,
    audit: Option<Arc<dyn AuditSink>>,
    notifier: Option<Arc<dyn EventNotifier>>,
}

impl fmt::Debug for Parliament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parliament")
            .field("config", &self.config)
            .field("members", &self.members.len())
            .field("closed", &self.scheduler.is_closed())
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for Parliament {
    fn default() -> Self {
        Self::build(ParliamentConfig::default())
    }
}

impl Parliament {
    /// Creates a parliament with the default seven-member roster.
    ///
    /// # Errors
    ///
    /// Propagates [`ParliamentConfig::validate`] failures.
    pub fn new(config: ParliamentConfig) -> ParliamentResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ParliamentConfig) -> Self {
        let rounds = NonZeroUsize::new(config.max_concurrent_rounds).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            members: default_roster().into(),
            policy: Arc::new(SpecialtyPolicy),
            book: Arc::new(Mutex::new(ProposalBook::default())),
            scheduler: RoundScheduler::new(rounds),
            counters: Arc::new(Counters::default()),
            audit: None,
            notifier: None,
        }
    }

    /// Replaces the roster.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::InvalidConfig`] for an empty roster.
    pub fn with_members(mut self, members: Vec<Parliamentarian>) -> ParliamentResult<Self> {
        if members.is_empty() {
            return Err(ParliamentError::InvalidConfig("roster must not be empty"));
        }
        self.members = members.into();
        Ok(self)
    }

    /// Replaces the voting policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn VotingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Records submissions, tallies, and cancellations to `sink`.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Publishes `vote_completed` events to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ParliamentConfig {
        &self.config
    }

    /// The roster.
    #[must_use]
    pub fn members(&self) -> &[Parliamentarian] {
        &self.members
    }

    /// Current totals.
    #[must_use]
    pub fn stats(&self) -> ParliamentStats {
        self.counters.snapshot()
    }

    /// Number of proposals still voting.
    pub async fn active_proposals(&self) -> usize {
        self.book.lock().await.active_len()
    }

    /// Registers a proposal and starts its voting round; returns without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::Closed`] after [`shutdown`](Self::shutdown).
    pub async fn submit_proposal(&self, request: ProposalRequest) -> ParliamentResult<ProposalId> {
        let timeout = request
            .timeout
            .unwrap_or_else(|| self.config.proposal_timeout());
        let proposal = Proposal::from_request(request, timeout);
        let id = proposal.id;

        let round = VotingRound {
            proposal: proposal.clone(),
            deadline: Instant::now().checked_add(timeout),
            vote_timeout: self.config.vote_timeout(),
            rules: self.config.rules,
            members: Arc::clone(&self.members),
            policy: Arc::clone(&self.policy),
            book: Arc::clone(&self.book),
            counters: Arc::clone(&self.counters),
            audit: self.audit.clone(),
            notifier: self.notifier.clone(),
        };

        // Held across spawn so the round cannot complete before it is active.
        {
            let mut book = self.book.lock().await;
            let handle = self.scheduler.spawn(round.run())?;
            book.activate(proposal.clone(), handle);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        info!(
            proposal_id = %id,
            title = %proposal.title,
            kind = ?proposal.kind,
            risk = %proposal.risk_level,
            ?timeout,
            "proposal submitted"
        );
        append_or_warn(
            self.audit.as_ref(),
            AuditRecord::new(ACTOR, "proposal_submitted", id.to_string()).with_payload(
                serde_json::to_value(&proposal).unwrap_or_default(),
            ),
        )
        .await;
        Ok(id)
    }

    /// Reports whether `id` is voting, completed, or unknown.
    pub async fn vote_status(&self, id: ProposalId) -> VoteStatus {
        self.book.lock().await.status(id)
    }

    /// Stops the voting round for `id` and records an escalated result.
    ///
    /// # Errors
    ///
    /// Returns [`ParliamentError::AlreadyCompleted`] when `id` already has a
    /// result and [`ParliamentError::ProposalNotFound`] when it is unknown.
    pub async fn cancel_proposal(&self, id: ProposalId) -> ParliamentResult<VoteResult> {
        let result = VoteResult::cancelled(id);
        {
            let mut book = self.book.lock().await;
            match book.complete(id, result.clone()) {
                Some(entry) => entry.round.abort(),
                None if book.is_completed(id) => {
                    return Err(ParliamentError::AlreadyCompleted(id));
                }
                None => return Err(ParliamentError::ProposalNotFound(id)),
            }
            self.counters.record(result.decision);
        }
        warn!(proposal_id = %id, "voting cancelled");
        append_or_warn(
            self.audit.as_ref(),
            AuditRecord::new(ACTOR, "proposal_cancelled", id.to_string())
                .with_result("escalated"),
        )
        .await;
        Ok(result)
    }

    /// Forgets completed results decided more than `older_than` ago. Returns
    /// how many were dropped; their ids report [`VoteStatus::NotFound`] afterwards.
    pub async fn prune_history(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };
        let pruned = self.book.lock().await.prune_history(cutoff);
        debug!(pruned, "vote history pruned");
        pruned
    }

    /// Rejects new proposals and cancels every active one. Returns how many were cancelled.
    pub async fn shutdown(&self) -> usize {
        self.scheduler.close();
        let active = self.book.lock().await.active_ids();
        let mut cancelled = 0;
        for id in active {
            if self.cancel_proposal(id).await.is_ok() {
                cancelled += 1;
            }
        }
        info!(cancelled, "parliament shut down");
        cancelled
    }
}

struct VotingRound {
    proposal: Proposal,
    deadline: Option<Instant>,
    vote_timeout: Duration,
    rules: TallyRules,
    members: Arc<[Parliamentarian]>,
    policy: Arc<dyn VotingPolicy>,
    book: Arc<Mutex<ProposalBook>>,
    counters: Arc<Counters>,
    audit: Option<Arc<dyn AuditSink>>,
    notifier: Option<Arc<dyn EventNotifier>>,
}

impl VotingRound {
    async fn run(self) {
        let id = self.proposal.id;
        let ballots = join_all(self.members.iter().map(|member| self.collect(member))).await;
        let result = tally(id, &ballots, self.members.len(), &self.rules);

        {
            let mut book = self.book.lock().await;
            if book.complete(id, result.clone()).is_none() {
                debug!(proposal_id = %id, "round finished after cancellation");
                return;
            }
            self.counters.record(result.decision);
        }

        info!(
            proposal_id = %id,
            decision = ?result.decision,
            confidence = result.confidence,
            votes_cast = result.votes_cast,
            quorum_met = result.quorum_met,
            "vote tallied"
        );
        let payload = serde_json::to_value(&result).unwrap_or_default();
        append_or_warn(
            self.audit.as_ref(),
            AuditRecord::new(ACTOR, "vote_tallied", id.to_string())
                .with_payload(payload.clone())
                .with_result(decision_str(result.decision)),
        )
        .await;
        publish_or_warn(
            self.notifier.as_ref(),
            "vote_completed",
            json!({ "proposal_id": id, "title": self.proposal.title, "result": payload }),
        )
        .await;
    }

    async fn collect(&self, member: &Parliamentarian) -> Ballot {
        let bound = self.deadline.map_or(self.vote_timeout, |deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .min(self.vote_timeout)
        });
        let vote = AssertUnwindSafe(self.policy.vote(member, &self.proposal)).catch_unwind();
        match tokio::time::timeout(bound, vote).await {
            Ok(Ok(Ok(value))) => {
                debug!(member = member.name(), ?value, "vote received");
                Ballot::cast(member, value)
            }
            Ok(Ok(Err(err))) => {
                warn!(member = member.name(), %err, "vote failed, recording abstention");
                Ballot::missing(member)
            }
            Ok(Err(_)) => {
                warn!(member = member.name(), "vote panicked, recording abstention");
                Ballot::missing(member)
            }
            Err(_) => {
                warn!(member = member.name(), ?bound, "vote timed out, recording abstention");
                Ballot::missing(member)
            }
        }
    }
}

fn decision_str(decision: VoteDecision) -> &'static str {
    match decision {
        VoteDecision::Approved => "approved",
        VoteDecision::Denied => "denied",
        VoteDecision::Escalated => "escalated",
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use gate_primitives::RiskLevel;
    use gate_telemetry::{ChannelNotifier, MemoryAuditSink};

    use super::*;
    use crate::member::Specialty;
    use crate::proposal::ProposalKind;
    use crate::vote::VoteValue;

    /// Votes per specialty; unlisted specialties fail.
    struct Scripted(Vec<(Specialty, VoteValue)>);

    #[async_trait]
    impl VotingPolicy for Scripted {
        async fn vote(
            &self,
            member: &Parliamentarian,
            _proposal: &Proposal,
        ) -> ParliamentResult<VoteValue> {
            self.0
                .iter()
                .find(|(specialty, _)| *specialty == member.specialty())
                .map(|(_, value)| *value)
                .ok_or_else(|| ParliamentError::Policy {
                    reason: "no opinion".into(),
                })
        }
    }

    /// Security votes promptly; everyone else is slower than any test timeout.
    struct Sluggish;

    #[async_trait]
    impl VotingPolicy for Sluggish {
        async fn vote(
            &self,
            member: &Parliamentarian,
            _proposal: &Proposal,
        ) -> ParliamentResult<VoteValue> {
            if member.specialty() != Specialty::Security {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(VoteValue::Approve)
        }
    }

    /// Performance panics mid-vote; everyone else approves.
    struct PerformancePanics;

    #[async_trait]
    impl VotingPolicy for PerformancePanics {
        async fn vote(
            &self,
            member: &Parliamentarian,
            _proposal: &Proposal,
        ) -> ParliamentResult<VoteValue> {
            if member.specialty() == Specialty::Performance {
                panic!("model backend crashed");
            }
            Ok(VoteValue::Approve)
        }
    }

    fn request(risk: RiskLevel) -> ProposalRequest {
        ProposalRequest::new("enable autoscaling", ProposalKind::Action, risk)
            .with_description("scale workers on queue depth")
            .with_proposer("ops-agent")
    }

    async fn wait_for_result(parliament: &Parliament, id: ProposalId) -> VoteResult {
        for _ in 0..400 {
            if let VoteStatus::Completed { result } = parliament.vote_status(id).await {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("proposal {id} never completed");
    }

    #[tokio::test]
    async fn low_risk_proposal_is_approved_by_default_policy() {
        let parliament = Parliament::default();
        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();

        let result = wait_for_result(&parliament, id).await;
        assert_eq!(result.decision, VoteDecision::Approved);
        assert_eq!(result.votes_cast, 7);
        assert_eq!(parliament.stats().approved, 1);
        assert_eq!(parliament.active_proposals().await, 0);
    }

    #[tokio::test]
    async fn high_risk_proposal_is_denied_by_security_alone() {
        let parliament = Parliament::default();
        let id = parliament.submit_proposal(request(RiskLevel::High)).await.unwrap();

        let result = wait_for_result(&parliament, id).await;
        // Escalations carry no weight, so the lone security deny outweighs zero approvals.
        assert_eq!(result.decision, VoteDecision::Denied);
        assert_eq!(result.deny_votes, 1);
        assert_eq!(result.escalate_votes, 6);
    }

    #[tokio::test]
    async fn three_of_seven_responding_misses_quorum() {
        let policy = Scripted(vec![
            (Specialty::Security, VoteValue::Approve),
            (Specialty::Ethics, VoteValue::Approve),
            (Specialty::Risk, VoteValue::Approve),
        ]);
        let parliament = Parliament::default().with_policy(Arc::new(policy));
        let id = parliament.submit_proposal(request(RiskLevel::Medium)).await.unwrap();

        let result = wait_for_result(&parliament, id).await;
        assert_eq!(result.decision, VoteDecision::Escalated);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.votes_cast, 3);
        assert_eq!(result.total_votes, 7);
    }

    #[tokio::test]
    async fn five_of_seven_approvals_pass() {
        let mut votes: Vec<_> = Specialty::ALL
            .into_iter()
            .map(|specialty| (specialty, VoteValue::Approve))
            .collect();
        votes[0].1 = VoteValue::Abstain;
        votes[1].1 = VoteValue::Abstain;
        let parliament = Parliament::default().with_policy(Arc::new(Scripted(votes)));
        let id = parliament.submit_proposal(request(RiskLevel::Medium)).await.unwrap();

        let result = wait_for_result(&parliament, id).await;
        assert_eq!(result.decision, VoteDecision::Approved);
        assert!((result.approve_fraction - 5.0 / 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn slow_members_abstain_without_blocking_the_round() {
        let config = ParliamentConfig {
            vote_timeout_ms: 20,
            ..ParliamentConfig::default()
        };
        let parliament = Parliament::new(config)
            .unwrap()
            .with_policy(Arc::new(Sluggish));
        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();

        let result = wait_for_result(&parliament, id).await;
        assert_eq!(result.votes_cast, 1);
        assert_eq!(result.abstain_votes, 6);
        assert_eq!(result.decision, VoteDecision::Escalated);
    }

    #[tokio::test]
    async fn panicking_member_abstains_and_the_round_completes() {
        let parliament = Parliament::default().with_policy(Arc::new(PerformancePanics));
        let id = parliament
            .submit_proposal(request(RiskLevel::Low).with_timeout(Duration::from_millis(200)))
            .await
            .unwrap();

        let result = wait_for_result(&parliament, id).await;
        assert_eq!(result.decision, VoteDecision::Approved);
        assert_eq!(result.votes_cast, 6);
        assert_eq!(result.approve_votes, 6);
        assert_eq!(result.abstain_votes, 1);
        assert_eq!(parliament.active_proposals().await, 0);
    }

    #[tokio::test]
    async fn status_is_stable_after_completion() {
        let parliament = Parliament::default();
        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();

        let first = wait_for_result(&parliament, id).await;
        for _ in 0..3 {
            assert_eq!(parliament.vote_status(id).await.result(), Some(&first));
        }
        assert_eq!(
            parliament.vote_status(ProposalId::random()).await,
            VoteStatus::NotFound
        );
    }

    #[tokio::test]
    async fn pruned_results_are_forgotten() {
        let parliament = Parliament::default();
        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();
        wait_for_result(&parliament, id).await;

        assert_eq!(parliament.prune_history(Duration::from_secs(3600)).await, 0);
        assert!(parliament.vote_status(id).await.result().is_some());

        assert_eq!(parliament.prune_history(Duration::ZERO).await, 1);
        assert_eq!(parliament.vote_status(id).await, VoteStatus::NotFound);
    }

    #[tokio::test]
    async fn cancel_records_escalation_once() {
        let parliament = Parliament::default().with_policy(Arc::new(Sluggish));
        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();
        assert!(matches!(
            parliament.vote_status(id).await,
            VoteStatus::Voting { .. }
        ));

        let result = parliament.cancel_proposal(id).await.unwrap();
        assert_eq!(result.decision, VoteDecision::Escalated);
        assert_eq!(result.reason, "voting cancelled");
        assert_eq!(parliament.vote_status(id).await.result(), Some(&result));

        assert_eq!(
            parliament.cancel_proposal(id).await.unwrap_err(),
            ParliamentError::AlreadyCompleted(id)
        );
        let unknown = ProposalId::random();
        assert_eq!(
            parliament.cancel_proposal(unknown).await.unwrap_err(),
            ParliamentError::ProposalNotFound(unknown)
        );
        assert_eq!(parliament.stats().escalated, 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_active_and_rejects_new_proposals() {
        let parliament = Parliament::default().with_policy(Arc::new(Sluggish));
        parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();
        parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();

        assert_eq!(parliament.shutdown().await, 2);
        assert_eq!(parliament.active_proposals().await, 0);
        assert!(matches!(
            parliament.submit_proposal(request(RiskLevel::Low)).await,
            Err(ParliamentError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn audits_and_notifies_completed_votes() {
        let sink = Arc::new(MemoryAuditSink::new());
        let notifier = Arc::new(ChannelNotifier::default());
        let mut events = notifier.subscribe();
        let parliament = Parliament::default()
            .with_audit_sink(sink.clone())
            .with_notifier(notifier.clone());

        let id = parliament.submit_proposal(request(RiskLevel::Low)).await.unwrap();
        wait_for_result(&parliament, id).await;

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, "vote_completed");
        assert_eq!(sink.records_for("proposal_submitted").await.len(), 1);
        let tallied = sink.records_for("vote_tallied").await;
        assert_eq!(tallied.len(), 1);
        assert_eq!(tallied[0].result(), "approved");
    }

    #[test]
    fn rejects_empty_roster_and_bad_config() {
        assert!(Parliament::default().with_members(Vec::new()).is_err());
        let config = ParliamentConfig {
            vote_timeout_ms: 0,
            ..ParliamentConfig::default()
        };
        assert!(Parliament::new(config).is_err());
    }
}
