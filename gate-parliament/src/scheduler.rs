//! Bounded spawner for voting rounds.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Spawns voting rounds on tokio, at most `max_rounds` running at once.
#[derive(Debug, Clone)]
pub struct RoundScheduler {
    permits: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    max_rounds: NonZeroUsize,
}

impl RoundScheduler {
    /// Creates a scheduler admitting `max_rounds` concurrent rounds.
    #[must_use]
    pub fn new(max_rounds: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_rounds.get())),
            closed: Arc::new(AtomicBool::new(false)),
            max_rounds,
        }
    }

    /// Concurrency limit.
    #[must_use]
    pub const fn max_rounds(&self) -> NonZeroUsize {
        self.max_rounds
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops admitting rounds. Rounds still waiting for a slot resolve to `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
    }

    /// Spawns `round` once a slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] after [`close`](Self::close).
    pub fn spawn<F, T>(&self, round: F) -> Result<JoinHandle<Option<T>>, SchedulerError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let permits = Arc::clone(&self.permits);
        Ok(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            Some(round.await)
        }))
    }
}

/// Errors produced by the [`RoundScheduler`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// No further rounds are accepted.
    #[error("round scheduler closed")]
    Closed,
}
