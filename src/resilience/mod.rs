//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request:
//!     → bulkhead.rs (take one of max_concurrent slots, or reject)
//!     → circuit_breaker.rs (fail fast while the backend is unhealthy)
//!     → timeouts.rs (every backend call has a deadline)
//!     → circuit_breaker.rs (record the outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries inside the gateway; callers own retry policy
//! - Slots and breaker tickets release on drop, so no exit path leaks them

pub mod bulkhead;
pub mod circuit_breaker;
pub mod timeouts;

pub use bulkhead::{BulkheadFull, ConcurrencyGate, InFlightPermit};
pub use circuit_breaker::{
    BreakerSettings, CallOutcome, CallTicket, CircuitBreaker, CircuitOpen, CircuitState,
};
pub use timeouts::{DeadlineExceeded, DeadlineGuard};
