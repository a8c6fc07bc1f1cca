//! Resilient recommendation gateway.
//!
//! Sits between callers and a recommendation backend and mediates every
//! request through per-client rate limiting, a bulkhead, a circuit breaker,
//! and a deadline, classifying every failure into a stable problem response.

pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mediation;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mediation::{ErrorKind, ErrorRecord, MediationOutcome, RequestMediator};
