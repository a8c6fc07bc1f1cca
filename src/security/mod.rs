//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Validated request:
//!     → rate_limit.rs (take one token from the caller's bucket)
//!     → Pass to the concurrency gate
//! ```
//!
//! # Design Decisions
//! - Callers are keyed by the first X-Forwarded-For entry, else the peer IP
//! - Memory is bounded: idle clients are evicted least-recently-used first

pub mod rate_limit;

pub use rate_limit::{RateLimitDecision, TokenBucketLimiter};
