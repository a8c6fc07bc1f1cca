//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, every call admitted
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: a bounded number of probe calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure rate ≥ threshold over ≥ minimum_calls in the window
//! Open → Half-Open:   first admit() after wait_duration (that caller is the probe)
//! Half-Open → Closed: half_open_successes_required probe successes
//! Half-Open → Open:   any probe failure
//! ```
//!
//! All state lives behind one mutex held only for counter updates. Each
//! transition bumps a generation number; outcomes of calls admitted under an
//! older generation are dropped so they cannot skew the new state's tallies.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Public view of the breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn code(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

/// How an admitted call ended, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    /// Neither healthy nor unhealthy (e.g. a timeout not counted as failure,
    /// or a cancelled call). Frees a probe slot without moving the state.
    Ignored,
}

/// The call was refused without reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit open")]
pub struct CircuitOpen;

/// Tunables for [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Percent, in (0, 100].
    pub failure_rate_threshold: f64,
    pub minimum_calls: u32,
    pub window: Duration,
    pub wait_duration: Duration,
    pub half_open_probes: u32,
    pub half_open_successes_required: u32,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_rate_threshold: config.failure_rate_threshold,
            minimum_calls: config.minimum_calls,
            window: config.window(),
            wait_duration: config.wait_duration(),
            half_open_probes: config.half_open_probes,
            half_open_successes_required: config.half_open_successes_required,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    generation: u64,
    failure_count: u32,
    success_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

/// Shared breaker for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                generation: 0,
                failure_count: 0,
                success_count: 0,
                window_start: Instant::now(),
                opened_at: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask to call the backend. The returned ticket must be completed with
    /// [`CallTicket::record`]; dropping it unrecorded counts as `Ignored`
    /// (or `Failure` while panicking).
    pub fn admit(self: &Arc<Self>) -> Result<CallTicket, CircuitOpen> {
        self.admit_at(Instant::now())
    }

    pub(crate) fn admit_at(self: &Arc<Self>, now: Instant) -> Result<CallTicket, CircuitOpen> {
        let mut inner = self.lock();
        let current = inner.state;
        let probe = match current {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.settings.wait_duration);
                if !cooled_down {
                    return Err(CircuitOpen);
                }
                self.transition(&mut inner, CircuitState::HalfOpen, now);
                inner.half_open_in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight >= self.settings.half_open_probes {
                    return Err(CircuitOpen);
                }
                inner.half_open_in_flight += 1;
                true
            }
        };

        Ok(CallTicket {
            breaker: Arc::clone(self),
            generation: inner.generation,
            probe,
            recorded: false,
        })
    }

    fn on_outcome(&self, generation: u64, probe: bool, outcome: CallOutcome, now: Instant) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }

        let current = inner.state;
        match current {
            CircuitState::Closed => {
                if now.saturating_duration_since(inner.window_start) >= self.settings.window {
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.window_start = now;
                }
                match outcome {
                    CallOutcome::Success => inner.success_count += 1,
                    CallOutcome::Failure => inner.failure_count += 1,
                    CallOutcome::Ignored => return,
                }

                let total = inner.failure_count + inner.success_count;
                if total >= self.settings.minimum_calls {
                    let rate = f64::from(inner.failure_count) * 100.0 / f64::from(total);
                    if rate >= self.settings.failure_rate_threshold {
                        tracing::warn!(
                            failures = inner.failure_count,
                            calls = total,
                            failure_rate = rate,
                            "Circuit breaker tripped"
                        );
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if probe {
                    inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                }
                match outcome {
                    CallOutcome::Failure => {
                        tracing::warn!("Half-open probe failed, reopening circuit");
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                    CallOutcome::Success => {
                        inner.half_open_successes += 1;
                        if inner.half_open_successes >= self.settings.half_open_successes_required {
                            tracing::info!("Backend recovered, closing circuit");
                            self.transition(&mut inner, CircuitState::Closed, now);
                        }
                    }
                    CallOutcome::Ignored => {}
                }
            }
            // No call is admitted while open, so there is nothing to count.
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState, now: Instant) {
        tracing::debug!(from = inner.state.as_str(), to = to.as_str(), "Circuit state change");
        inner.state = to;
        inner.generation += 1;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.window_start = now;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        if to == CircuitState::Open {
            inner.opened_at = Some(now);
        }
        metrics::record_circuit_transition(to.as_str(), to.code());
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permission for one backend call; reports its outcome exactly once.
#[derive(Debug)]
pub struct CallTicket {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    probe: bool,
    recorded: bool,
}

impl CallTicket {
    /// Whether this call is a half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, outcome: CallOutcome) {
        self.finish(outcome, Instant::now());
    }

    #[cfg(test)]
    fn record_at(mut self, outcome: CallOutcome, now: Instant) {
        self.finish(outcome, now);
    }

    fn finish(&mut self, outcome: CallOutcome, now: Instant) {
        if !self.recorded {
            self.recorded = true;
            self.breaker.on_outcome(self.generation, self.probe, outcome, now);
        }
    }
}

impl Drop for CallTicket {
    fn drop(&mut self) {
        let outcome = if std::thread::panicking() {
            CallOutcome::Failure
        } else {
            CallOutcome::Ignored
        };
        self.finish(outcome, Instant::now());
    }
}
