//! Observability collaborators for the governance gate.
//!
//! The gate never stores audit history itself; it appends to an externally
//! supplied [`AuditSink`] and optionally publishes outcomes through an
//! [`EventNotifier`]. Failures of either are logged and never change a
//! governance decision.

#![warn(missing_docs, clippy::pedantic)]

pub mod audit;
pub mod notify;
pub mod tracing_support;

pub use audit::{
    AuditError, AuditRecord, AuditResult, AuditSink, MemoryAuditSink, TracingAuditSink,
    append_or_warn,
};
pub use notify::{
    ChannelNotifier, EventNotifier, GateEvent, NotifyError, NotifyResult, publish_or_warn,
};
pub use tracing_support::init_tracing;
