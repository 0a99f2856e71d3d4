//! Process-wide admission control for the rate-limited AI dependency.
//!
//! One exclusive slot plus a watermark of the last AI call. Holders of an
//! [`AccessPermit`] call [`AccessPermit::pace`] before every AI-backed call,
//! so consecutive calls across all tickets are at least `min_interval`
//! apart. Dropping the permit releases the slot on every exit path.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Errors returned by [`AccessGate::acquire`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateError {
    /// The slot stayed held for the whole wait.
    #[error("timed out after {}s waiting for the AI access gate", waited.as_secs())]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

#[derive(Debug, Default)]
struct Watermark {
    last_call: Option<Instant>,
}

/// Shared AI access gate. Clones refer to the same slot and watermark.
#[derive(Debug, Clone)]
pub struct AccessGate {
    slot: Arc<Mutex<Watermark>>,
    min_interval: Duration,
}

impl AccessGate {
    /// Creates a gate enforcing `min_interval` between AI calls.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Watermark::default())),
            min_interval,
        }
    }

    /// Returns the configured pacing interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits up to `wait` for the slot.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Timeout`] when the slot is still held after
    /// `wait`.
    pub async fn acquire(&self, wait: Duration) -> GateResult<AccessPermit> {
        let guard = tokio::time::timeout(wait, Arc::clone(&self.slot).lock_owned())
            .await
            .map_err(|_| GateError::Timeout { waited: wait })?;
        Ok(AccessPermit {
            guard,
            min_interval: self.min_interval,
        })
    }

    /// Returns `true` while some caller holds a permit.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

/// Exclusive hold on the [`AccessGate`].
#[derive(Debug)]
pub struct AccessPermit {
    guard: OwnedMutexGuard<Watermark>,
    min_interval: Duration,
}

impl AccessPermit {
    /// Sleeps until `min_interval` has passed since the previous AI call,
    /// then records the current instant as the new watermark.
    ///
    /// An interval too large to add to an [`Instant`] never elapses.
    pub async fn pace(&mut self) -> Instant {
        if let Some(last) = self.guard.last_call {
            match last.checked_add(self.min_interval) {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        }
        let now = Instant::now();
        self.guard.last_call = Some(now);
        now
    }

    /// Returns the watermark of the previous AI call.
    #[must_use]
    pub fn last_call(&self) -> Option<Instant> {
        self.guard.last_call
    }
}
