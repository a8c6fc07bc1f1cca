//! Request mediation pipeline.
//!
//! # Data Flow
//! ```text
//! mediate(client_key, request)
//!     → TokenBucketLimiter::try_acquire   (RATE_LIMITED 429)
//!     → ConcurrencyGate::acquire          (CONCURRENCY_REJECTED 503)
//!     → CircuitBreaker::admit             (CIRCUIT_OPEN 503, permit released)
//!     → spawned task: BackendInvoker::invoke, record outcome, release permit
//!     → decode payload or classify the failure
//! ```
//!
//! # Design Decisions
//! - The backend call runs in its own task. If the caller goes away the call
//!   still resolves and its permit and breaker ticket are finalized.
//! - A failed request never panics the pipeline; every failure becomes an
//!   [`ErrorRecord`].

use std::sync::Arc;

use axum::body::Bytes;

use crate::backend::{BackendInvoker, Invocation, RecommendationRequest, RecommendationResponse, TransportError};
use crate::config::GatewayConfig;
use crate::mediation::errors::{Disposition, ErrorKind, ErrorRecord};
use crate::observability::metrics;
use crate::resilience::{CallOutcome, CircuitBreaker, CircuitState, ConcurrencyGate};
use crate::security::{RateLimitDecision, TokenBucketLimiter};

/// Mediation tunables that are not owned by a single resilience component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediationSettings {
    /// Fixed backoff hint for CIRCUIT_OPEN and BACKEND_UNREACHABLE.
    pub retry_after_secs: u64,
    pub count_timeouts_as_failures: bool,
}

impl MediationSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            retry_after_secs: config.circuit_breaker.retry_after_secs,
            count_timeouts_as_failures: config.circuit_breaker.count_timeouts_as_failures,
        }
    }
}

/// Result of one mediated request.
#[derive(Debug)]
pub struct MediationOutcome {
    /// Decision taken at the rate limiter; always present so the HTTP layer
    /// can emit rate-limit headers.
    pub rate_limit: RateLimitDecision,
    pub result: Result<RecommendationResponse, ErrorRecord>,
}

/// Why an admitted backend call did not yield a usable payload.
#[derive(Debug)]
enum BackendFailure {
    Timeout,
    Unreachable(TransportError),
    Invalid(String),
}

pub struct RequestMediator {
    limiter: Arc<TokenBucketLimiter>,
    gate: ConcurrencyGate,
    breaker: Arc<CircuitBreaker>,
    invoker: BackendInvoker,
    settings: MediationSettings,
}

impl RequestMediator {
    pub fn new(
        limiter: Arc<TokenBucketLimiter>,
        gate: ConcurrencyGate,
        breaker: Arc<CircuitBreaker>,
        invoker: BackendInvoker,
        settings: MediationSettings,
    ) -> Self {
        Self {
            limiter,
            gate,
            breaker,
            invoker,
            settings,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.tracked_clients()
    }

    pub fn rate_limit_capacity(&self) -> u64 {
        self.limiter.capacity()
    }

    /// Run one request through the resilience pipeline.
    pub async fn mediate(
        &self,
        client_key: &str,
        request: &RecommendationRequest,
    ) -> MediationOutcome {
        let rate_limit = self.limiter.try_acquire(client_key);
        if !rate_limit.allowed {
            metrics::record_rejection("rate_limited");
            tracing::debug!(
                client = %client_key,
                reset_seconds = rate_limit.reset_seconds,
                "Rate limit exceeded"
            );
            return MediationOutcome {
                rate_limit,
                result: Err(ErrorRecord::new(
                    ErrorKind::RateLimited,
                    Some(rate_limit.reset_seconds),
                )),
            };
        }

        let result = self.call_backend(client_key, request).await;
        MediationOutcome { rate_limit, result }
    }

    async fn call_backend(
        &self,
        client_key: &str,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, ErrorRecord> {
        let payload = match serde_json::to_vec(request) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                return Err(self.unexpected(
                    ErrorKind::Internal,
                    client_key,
                    format!("failed to serialize backend request: {e}"),
                ))
            }
        };

        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(full) => {
                metrics::record_rejection("concurrency_rejected");
                tracing::warn!(
                    client = %client_key,
                    max_concurrent = full.max_concurrent,
                    "Backend concurrency limit reached"
                );
                return Err(ErrorRecord::new(ErrorKind::ConcurrencyRejected, None));
            }
        };

        let ticket = match self.breaker.admit() {
            Ok(ticket) => ticket,
            Err(_) => {
                drop(permit);
                metrics::record_rejection("circuit_open");
                tracing::debug!(client = %client_key, "Circuit open, failing fast");
                return Err(ErrorRecord::new(
                    ErrorKind::CircuitOpen,
                    Some(self.settings.retry_after_secs),
                ));
            }
        };

        let invoker = self.invoker.clone();
        let count_timeouts = self.settings.count_timeouts_as_failures;
        let call = tokio::spawn(async move {
            let _permit = permit;
            let invocation = invoker.invoke(payload).await;
            let (outcome, result) = interpret(invocation, count_timeouts);
            ticket.record(outcome);
            result
        });

        match call.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err(self.classify_failure(client_key, failure)),
            Err(join_error) => Err(self.unexpected(
                ErrorKind::Internal,
                client_key,
                format!("backend call task failed: {join_error}"),
            )),
        }
    }

    fn classify_failure(&self, client_key: &str, failure: BackendFailure) -> ErrorRecord {
        match failure {
            BackendFailure::Timeout => {
                metrics::record_rejection("timeout");
                tracing::warn!(client = %client_key, "Backend call timed out");
                ErrorRecord::new(ErrorKind::Timeout, None)
            }
            BackendFailure::Unreachable(err) => {
                metrics::record_rejection("backend_unreachable");
                tracing::warn!(client = %client_key, error = %err, "Backend unreachable");
                ErrorRecord::new(
                    ErrorKind::BackendUnreachable,
                    Some(self.settings.retry_after_secs),
                )
            }
            BackendFailure::Invalid(reason) => {
                self.unexpected(ErrorKind::BackendInvalidResponse, client_key, reason)
            }
        }
    }

    fn unexpected(&self, kind: ErrorKind, client_key: &str, reason: String) -> ErrorRecord {
        let record = ErrorRecord::new(kind, None);
        debug_assert_eq!(record.classification().disposition, Disposition::Unexpected);
        metrics::record_rejection(match kind {
            ErrorKind::BackendInvalidResponse => "backend_invalid_response",
            _ => "internal",
        });
        tracing::error!(
            correlation_id = %record.correlation_id(),
            kind = %kind,
            client = %client_key,
            reason = %reason,
            "Recommendation request failed"
        );
        record
    }
}

/// Decide the breaker outcome and the payload for one invocation.
fn interpret(
    invocation: Invocation,
    count_timeouts: bool,
) -> (CallOutcome, Result<RecommendationResponse, BackendFailure>) {
    match invocation {
        Invocation::Completed(reply) if reply.status.is_success() => {
            match serde_json::from_slice::<RecommendationResponse>(&reply.body) {
                Ok(response) => (CallOutcome::Success, Ok(response)),
                Err(e) => (
                    CallOutcome::Failure,
                    Err(BackendFailure::Invalid(format!("malformed backend payload: {e}"))),
                ),
            }
        }
        Invocation::Completed(reply) => (
            CallOutcome::Failure,
            Err(BackendFailure::Invalid(format!(
                "backend answered with status {}",
                reply.status
            ))),
        ),
        Invocation::TimedOut => {
            let outcome = if count_timeouts {
                CallOutcome::Failure
            } else {
                CallOutcome::Ignored
            };
            (outcome, Err(BackendFailure::Timeout))
        }
        Invocation::Unreachable(err) => (CallOutcome::Failure, Err(BackendFailure::Unreachable(err))),
    }
}
