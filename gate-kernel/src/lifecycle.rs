//! Lifecycle state machine for the gate.

use thiserror::Error;
use tracing::debug;

/// States the gate moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Constructed, not yet accepting requests.
    Init,
    /// Evaluating requests.
    Running,
    /// Shut down; requests yield error decisions.
    Stopped,
}

/// Events driving [`GateState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Begin accepting requests.
    Start,
    /// Stop accepting requests.
    Stop,
}

/// Lifecycle controller.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    state: GateState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: GateState::Init,
        }
    }
}

impl Lifecycle {
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Applies `event`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when `event` is not
    /// allowed from the current state. Stopping twice is allowed.
    pub fn transition(&mut self, event: LifecycleEvent) -> Result<GateState, LifecycleError> {
        let next = match (self.state, event) {
            (GateState::Init, LifecycleEvent::Start) => GateState::Running,
            (_, LifecycleEvent::Stop) => GateState::Stopped,
            (from, event) => return Err(LifecycleError::InvalidTransition { from, event }),
        };
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?event, "gate lifecycle transition");
            self.state = next;
        }
        Ok(next)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// `event` is not allowed from `from`.
    #[error("invalid gate lifecycle transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State before the attempt.
        from: GateState,
        /// Rejected event.
        event: LifecycleEvent,
    },
    /// The gate is not in [`GateState::Running`].
    #[error("governance gate is not running (state {0:?})")]
    NotRunning(GateState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_stop() {
        let mut lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.transition(LifecycleEvent::Start).unwrap(), GateState::Running);
        assert_eq!(lifecycle.transition(LifecycleEvent::Stop).unwrap(), GateState::Stopped);
        assert_eq!(lifecycle.transition(LifecycleEvent::Stop).unwrap(), GateState::Stopped);
    }

    #[test]
    fn cannot_restart_after_stop() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.transition(LifecycleEvent::Stop).unwrap();
        let err = lifecycle.transition(LifecycleEvent::Start).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: GateState::Stopped,
                event: LifecycleEvent::Start,
            }
        );
    }
}
