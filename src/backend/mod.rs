//! Recommendation backend boundary.
//!
//! # Data Flow
//! ```text
//! RecommendationRequest (types.rs)
//!     → serialized by the mediator
//!     → invoker.rs (deadline race)
//!     → transport.rs (HTTP POST, connect timeout, bounded body read)
//!     → Invocation::{Completed, TimedOut, Unreachable}
//! ```

pub mod invoker;
pub mod transport;
pub mod types;

pub use invoker::{BackendInvoker, Invocation};
pub use transport::{BackendReply, BackendTransport, HttpTransport, TransportError};
pub use types::{EpisodeContext, RecommendationRequest, RecommendationResponse, RecommendedEpisode};
