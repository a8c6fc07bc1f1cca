//! Bounded concurrency (bulkhead) for backend calls.
//!
//! A slot is held by an [`InFlightPermit`] and returned when the permit is
//! dropped, so every exit path releases it, including panics and task
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BulkheadConfig;
use crate::observability::metrics;

/// No slot was available within the allowed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bulkhead full ({max_concurrent} calls in flight)")]
pub struct BulkheadFull {
    pub max_concurrent: usize,
}

/// Counting gate in front of the backend.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    max_wait: Duration,
}

impl ConcurrencyGate {
    /// `max_wait` of zero rejects immediately when saturated.
    pub fn new(max_concurrent: usize, max_wait: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            max_wait,
        }
    }

    pub fn from_config(config: &BulkheadConfig) -> Self {
        Self::new(config.max_concurrent, config.max_wait())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.available()
    }

    /// Take a slot according to the configured policy.
    pub async fn acquire(&self) -> Result<InFlightPermit, BulkheadFull> {
        if self.max_wait.is_zero() {
            self.try_acquire()
        } else {
            self.acquire_within(self.max_wait).await
        }
    }

    /// Take a slot or fail immediately.
    pub fn try_acquire(&self) -> Result<InFlightPermit, BulkheadFull> {
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Ok(self.wrap(permit)),
            Err(_) => Err(self.full()),
        }
    }

    /// Wait up to `wait` for a slot.
    pub async fn acquire_within(&self, wait: Duration) -> Result<InFlightPermit, BulkheadFull> {
        match tokio::time::timeout(wait, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(self.wrap(permit)),
            // Elapsed, or the semaphore was closed.
            _ => Err(self.full()),
        }
    }

    fn wrap(&self, permit: OwnedSemaphorePermit) -> InFlightPermit {
        metrics::record_in_flight(self.in_flight());
        InFlightPermit {
            _permit: permit,
            slots: self.slots.clone(),
            max_concurrent: self.max_concurrent,
        }
    }

    fn full(&self) -> BulkheadFull {
        BulkheadFull {
            max_concurrent: self.max_concurrent,
        }
    }
}

/// One occupied backend-call slot.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        // The semaphore slot itself is returned when `_permit` drops right after this.
        let in_flight = self
            .max_concurrent
            .saturating_sub(self.slots.available_permits() + 1);
        metrics::record_in_flight(in_flight);
    }
}
