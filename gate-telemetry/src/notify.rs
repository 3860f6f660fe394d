//! Outcome notifications for dashboards and other observers.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors surfaced by event notifiers.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notifier backend failed to deliver the event.
    #[error("event publish failed: {reason}")]
    Publish {
        /// Human-readable explanation for operators.
        reason: String,
    },
}

/// Result alias for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Event published when a governance outcome becomes available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvent {
    /// Event type, e.g. `vote_completed`.
    pub event_type: String,
    /// Event payload.
    pub payload: Value,
}

/// Publishes governance events to external observers.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    /// Publishes an event.
    async fn publish(&self, event_type: &str, payload: Value) -> NotifyResult<()>;
}

/// Publishes through an optional notifier, logging failures and panics.
pub async fn publish_or_warn(
    notifier: Option<&Arc<dyn EventNotifier>>,
    event_type: &str,
    payload: Value,
) {
    let Some(notifier) = notifier else {
        return;
    };
    match AssertUnwindSafe(notifier.publish(event_type, payload))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%err, event_type, "event notification failed"),
        Err(_) => warn!(event_type, "event notifier panicked"),
    }
}

/// Notifier fanning events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: broadcast::Sender<GateEvent>,
}

impl ChannelNotifier {
    /// Creates a notifier buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EventNotifier for ChannelNotifier {
    async fn publish(&self, event_type: &str, payload: Value) -> NotifyResult<()> {
        let event = GateEvent {
            event_type: event_type.to_owned(),
            payload,
        };
        // A send error only means nobody is subscribed right now.
        if self.sender.send(event).is_err() {
            debug!(event_type, "no subscribers for governance event");
        }
        Ok(())
    }
}
