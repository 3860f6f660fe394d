//! Governance gate for autonomous agent actions.
//!
//! Every proposed action passes a constitution check, optional verification
//! of attached code and claims, and, when its tier or violations demand it, a
//! weighted vote by a committee of specialists. Component crates sit behind
//! feature flags; all are enabled by default.

#![warn(missing_docs, clippy::pedantic)]

/// Shared identifiers, action descriptors, and evidence.
pub use gate_primitives as primitives;

/// The `GovernanceGate` orchestrator (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use gate_kernel as kernel;

/// Rule sets and constitutional validation (enabled by `constitution` feature).
#[cfg(feature = "constitution")]
pub use gate_constitution as constitution;

/// Code, hypothesis, and unit-test checks (enabled by `verification` feature).
#[cfg(feature = "verification")]
pub use gate_verification as verification;

/// Committee voting (enabled by `parliament` feature).
#[cfg(feature = "parliament")]
pub use gate_parliament as parliament;

/// Audit sinks, notifiers, and tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use gate_telemetry as telemetry;

/// Configuration documents and loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use gate_config as config;
