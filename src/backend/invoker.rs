//! Backend invocation under a deadline.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;

use crate::backend::transport::{BackendReply, BackendTransport, TransportError};
use crate::observability::metrics;
use crate::resilience::DeadlineGuard;

/// Exactly one of these is produced per invocation.
#[derive(Debug)]
pub enum Invocation {
    /// The backend answered; the status may still be a fault.
    Completed(BackendReply),
    /// The deadline passed first; the call was abandoned.
    TimedOut,
    /// The backend could not be reached or the exchange broke down.
    Unreachable(TransportError),
}

impl Invocation {
    fn label(&self) -> &'static str {
        match self {
            Invocation::Completed(_) => "completed",
            Invocation::TimedOut => "timed_out",
            Invocation::Unreachable(_) => "unreachable",
        }
    }
}

/// Sends payloads through a transport, racing each call against a deadline.
#[derive(Clone)]
pub struct BackendInvoker {
    transport: Arc<dyn BackendTransport>,
    deadline: DeadlineGuard,
}

impl BackendInvoker {
    pub fn new(transport: Arc<dyn BackendTransport>, deadline: DeadlineGuard) -> Self {
        Self { transport, deadline }
    }

    pub async fn invoke(&self, payload: Bytes) -> Invocation {
        let started = Instant::now();
        let invocation = match self.deadline.run(self.transport.send(payload)).await {
            Ok(Ok(reply)) => Invocation::Completed(reply),
            Ok(Err(err)) => Invocation::Unreachable(err),
            Err(_) => Invocation::TimedOut,
        };

        metrics::record_backend_call(invocation.label(), started.elapsed());
        tracing::debug!(
            outcome = invocation.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backend call finished"
        );
        invocation
    }
}
