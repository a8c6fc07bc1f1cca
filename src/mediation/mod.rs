//! Request mediation: the fixed resilience pipeline and its failure taxonomy.
//!
//! # Responsibilities
//! - Run each request through rate limiting, the bulkhead, and the breaker
//! - Invoke the backend under a deadline and record the outcome
//! - Turn every failure into an immutable [`ErrorRecord`]

pub mod errors;
pub mod mediator;

pub use errors::{classify, Classification, Disposition, ErrorKind, ErrorRecord};
pub use mediator::{MediationOutcome, MediationSettings, RequestMediator};
