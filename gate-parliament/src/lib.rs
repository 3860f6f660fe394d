//! Weighted committee voting for governance decisions.
//!
//! A [`Parliament`] holds a fixed roster of [`Parliamentarian`]s. Each
//! submitted proposal gets a voting round on a bounded scheduler; every
//! member votes concurrently under a timeout, non-responders abstain, and the
//! ballots are [`tally`]'d against quorum and approval-threshold rules.

#![warn(missing_docs, clippy::pedantic)]

mod book;
mod error;
pub mod member;
mod parliament;
pub mod policy;
pub mod proposal;
pub mod scheduler;
pub mod vote;

pub use book::VoteStatus;
pub use error::{ParliamentError, ParliamentResult};
pub use member::{Parliamentarian, Specialty, default_roster};
pub use parliament::{Parliament, ParliamentConfig, ParliamentStats};
pub use policy::{SpecialtyPolicy, VotingPolicy};
pub use proposal::{Proposal, ProposalKind, ProposalRequest};
pub use scheduler::{RoundScheduler, SchedulerError};
pub use vote::{Ballot, TallyRules, VoteDecision, VoteResult, VoteValue, tally};
