//! Failure taxonomy and its mapping onto HTTP semantics.

use std::fmt;

use axum::http::StatusCode;
use uuid::Uuid;

/// Every way a recommendation request can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    ConcurrencyRejected,
    CircuitOpen,
    Timeout,
    BackendUnreachable,
    BackendInvalidResponse,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::ConcurrencyRejected => "CONCURRENCY_REJECTED",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::BackendUnreachable => "BACKEND_UNREACHABLE",
            ErrorKind::BackendInvalidResponse => "BACKEND_INVALID_RESPONSE",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a failure is part of normal operation under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Recoverable by retrying later; not an application error.
    Expected,
    /// A bug or contract breach; logged with full context.
    Unexpected,
}

/// Caller-facing description of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    /// Stable `TES-0NN` code.
    pub code: &'static str,
    pub message_key: &'static str,
    pub title: &'static str,
    pub retry_hint: bool,
    pub disposition: Disposition,
}

impl Classification {
    /// Problem `type` URI for this code.
    pub fn type_uri(&self) -> String {
        format!("https://tes.dev/errors/{}", self.code.to_ascii_lowercase())
    }
}

const UNAVAILABLE_TITLE: &str = "Recommendation service is temporarily unavailable";

/// Pure kind → classification table.
pub fn classify(kind: ErrorKind) -> Classification {
    use Disposition::{Expected, Unexpected};

    let (status, code, message_key, title, retry_hint, disposition) = match kind {
        ErrorKind::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            "TES-003",
            "error.rate_limited",
            "Too many requests, please slow down",
            true,
            Expected,
        ),
        ErrorKind::CircuitOpen | ErrorKind::BackendUnreachable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "TES-002",
            "error.ml_unavailable",
            UNAVAILABLE_TITLE,
            true,
            Expected,
        ),
        ErrorKind::ConcurrencyRejected => (
            StatusCode::SERVICE_UNAVAILABLE,
            "TES-002",
            "error.ml_unavailable",
            UNAVAILABLE_TITLE,
            false,
            Expected,
        ),
        ErrorKind::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            "TES-004",
            "error.timeout",
            "Recommendation service did not respond in time",
            false,
            Expected,
        ),
        ErrorKind::Validation => (
            StatusCode::BAD_REQUEST,
            "TES-001",
            "error.invalid_request",
            "Invalid request",
            false,
            Expected,
        ),
        ErrorKind::BackendInvalidResponse => (
            StatusCode::BAD_GATEWAY,
            "TES-000",
            "error.internal",
            "Internal error",
            false,
            Unexpected,
        ),
        ErrorKind::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "TES-000",
            "error.internal",
            "Internal error",
            false,
            Unexpected,
        ),
    };

    Classification {
        status,
        code,
        message_key,
        title,
        retry_hint,
        disposition,
    }
}

/// One failed request, built once and never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    kind: ErrorKind,
    classification: Classification,
    retry_after_seconds: Option<u64>,
    correlation_id: Uuid,
    detail: Option<String>,
}

impl ErrorRecord {
    /// `retry_after_seconds` is kept only for kinds that carry a retry hint.
    pub fn new(kind: ErrorKind, retry_after_seconds: Option<u64>) -> Self {
        let classification = classify(kind);
        Self {
            kind,
            classification,
            retry_after_seconds: retry_after_seconds.filter(|_| classification.retry_hint),
            correlation_id: Uuid::new_v4(),
            detail: None,
        }
    }

    /// Attach caller-safe detail (validation messages only).
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn http_status(&self) -> StatusCode {
        self.classification.status
    }

    pub fn code(&self) -> &'static str {
        self.classification.code
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after_seconds
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Human-readable detail; falls back to the title so nothing internal leaks.
    pub fn detail(&self) -> &str {
        self.detail.as_deref().unwrap_or(self.classification.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_error_codes() {
        let expected = [
            (ErrorKind::RateLimited, 429, "TES-003"),
            (ErrorKind::CircuitOpen, 503, "TES-002"),
            (ErrorKind::ConcurrencyRejected, 503, "TES-002"),
            (ErrorKind::BackendUnreachable, 503, "TES-002"),
            (ErrorKind::Timeout, 504, "TES-004"),
            (ErrorKind::Validation, 400, "TES-001"),
            (ErrorKind::BackendInvalidResponse, 502, "TES-000"),
            (ErrorKind::Internal, 500, "TES-000"),
        ];
        for (kind, status, code) in expected {
            let c = classify(kind);
            assert_eq!(c.status.as_u16(), status, "{kind}");
            assert_eq!(c.code, code, "{kind}");
        }
    }

    #[test]
    fn only_unexpected_kinds_are_unexpected() {
        for kind in [ErrorKind::BackendInvalidResponse, ErrorKind::Internal] {
            assert_eq!(classify(kind).disposition, Disposition::Unexpected);
        }
        assert_eq!(classify(ErrorKind::Timeout).disposition, Disposition::Expected);
    }

    #[test]
    fn retry_hint_kept_only_where_applicable() {
        assert_eq!(ErrorRecord::new(ErrorKind::CircuitOpen, Some(10)).retry_after_seconds(), Some(10));
        assert_eq!(ErrorRecord::new(ErrorKind::Timeout, Some(10)).retry_after_seconds(), None);
    }

    #[test]
    fn each_record_gets_its_own_correlation_id() {
        let a = ErrorRecord::new(ErrorKind::Internal, None);
        let b = ErrorRecord::new(ErrorKind::Internal, None);
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert_eq!(a.detail(), "Internal error");
    }

    #[test]
    fn type_uri_uses_lowercase_code() {
        assert_eq!(classify(ErrorKind::RateLimited).type_uri(), "https://tes.dev/errors/tes-003");
    }
}
