//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, body limit)
//!     → request.rs (client key, body validation)
//!     → mediation (rate limit, bulkhead, breaker, backend call)
//!     → response.rs (payload or problem details, rate-limit headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{client_key, validate, RequestValidationError, X_FORWARDED_FOR, X_REQUEST_ID};
pub use response::{apply_rate_limit_headers, problem_response, problem_response_with_status, ProblemResponse};
pub use server::{AppState, HttpServer, ServerError};
