//! Append-only audit sink contract.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors surfaced by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink rejected or failed to persist the record.
    #[error("audit sink failure: {reason}")]
    Backend {
        /// Human-readable explanation for operators.
        reason: String,
    },
}

impl AuditError {
    /// Convenience helper to construct backend errors.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// One significant governance transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    actor: String,
    action: String,
    resource: String,
    #[serde(default)]
    payload: Value,
    result: String,
    recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record with an empty payload and `ok` result.
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            payload: Value::Null,
            result: "ok".into(),
            recorded_at: Utc::now(),
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the result label, e.g. `denied`.
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    /// Component that performed the transition.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Transition name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Subject of the transition.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Structured payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Result label.
    #[must_use]
    pub fn result(&self) -> &str {
        &self.result
    }

    /// Time the record was created.
    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Append-only destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends a record.
    async fn append(&self, record: AuditRecord) -> AuditResult<()>;
}

/// Appends to an optional sink, logging instead of propagating failures.
///
/// A sink that panics is treated like one that failed.
pub async fn append_or_warn(sink: Option<&Arc<dyn AuditSink>>, record: AuditRecord) {
    let Some(sink) = sink else {
        return;
    };
    let action = record.action().to_owned();
    match AssertUnwindSafe(sink.append(record)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, action, "audit append failed"),
        Err(_) => warn!(action, "audit sink panicked"),
    }
}

/// Audit sink that writes records to the tracing system.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, record: AuditRecord) -> AuditResult<()> {
        info!(
            actor = record.actor(),
            action = record.action(),
            resource = record.resource(),
            result = record.result(),
            payload = %record.payload(),
            "governance audit record"
        );
        Ok(())
    }
}

/// In-process sink retaining every record, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the appended records, oldest first.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    /// Returns the records whose action matches `action`.
    pub async fn records_for(&self, action: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|record| record.action() == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> AuditResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _record: AuditRecord) -> AuditResult<()> {
            Err(AuditError::backend("disk full"))
        }
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.append(AuditRecord::new("gate", "decision", "a")).await.unwrap();
        sink.append(
            AuditRecord::new("parliament", "vote_tallied", "b")
                .with_payload(json!({ "decision": "approved" }))
                .with_result("approved"),
        )
        .await
        .unwrap();

        let records = sink.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].result(), "approved");
        assert_eq!(sink.records_for("decision").await.len(), 1);
    }

    struct PanickingSink;

    #[async_trait]
    impl AuditSink for PanickingSink {
        async fn append(&self, _record: AuditRecord) -> AuditResult<()> {
            panic!("audit store unreachable");
        }
    }

    #[tokio::test]
    async fn panicking_sink_is_contained() {
        let sink: Arc<dyn AuditSink> = Arc::new(PanickingSink);
        append_or_warn(Some(&sink), AuditRecord::new("gate", "final_decision", "x")).await;
    }

    #[tokio::test]
    async fn failing_sink_is_swallowed() {
        let sink: Arc<dyn AuditSink> = Arc::new(FailingSink);
        append_or_warn(Some(&sink), AuditRecord::new("gate", "decision", "x")).await;
        append_or_warn(None, AuditRecord::new("gate", "decision", "x")).await;
    }
}
