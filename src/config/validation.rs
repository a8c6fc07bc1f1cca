//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field constraints.
//! Every problem is reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every violation found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let backend = &config.backend;
    match url::Url::parse(&backend.base_url) {
        Ok(url) if url.scheme() == "http" => {}
        Ok(url) => errors.push(ValidationError::new(
            "backend.base_url",
            format!("unsupported scheme '{}', expected http", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "backend.base_url",
            format!("'{}' is not a valid URL: {}", backend.base_url, e),
        )),
    }
    if !backend.path.starts_with('/') {
        errors.push(ValidationError::new("backend.path", "must start with '/'"));
    }
    if backend.call_timeout_ms == 0 {
        errors.push(ValidationError::new("backend.call_timeout_ms", "must be > 0"));
    }
    if backend.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("backend.connect_timeout_ms", "must be > 0"));
    }
    if backend.connect_timeout_ms >= backend.call_timeout_ms {
        errors.push(ValidationError::new(
            "backend.connect_timeout_ms",
            format!(
                "must be strictly shorter than call_timeout_ms ({} >= {})",
                backend.connect_timeout_ms, backend.call_timeout_ms
            ),
        ));
    }
    if backend.max_response_bytes == 0 {
        errors.push(ValidationError::new("backend.max_response_bytes", "must be > 0"));
    }

    let rate = &config.rate_limit;
    if rate.capacity == 0 {
        errors.push(ValidationError::new("rate_limit.capacity", "must be > 0"));
    }
    if rate.refill_period_secs == 0 {
        errors.push(ValidationError::new("rate_limit.refill_period_secs", "must be > 0"));
    }
    if rate.max_tracked_clients == 0 {
        errors.push(ValidationError::new("rate_limit.max_tracked_clients", "must be > 0"));
    }

    if config.bulkhead.max_concurrent == 0 {
        errors.push(ValidationError::new("bulkhead.max_concurrent", "must be > 0"));
    }

    let cb = &config.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            "must be in (0, 100]",
        ));
    }
    if cb.minimum_calls == 0 {
        errors.push(ValidationError::new("circuit_breaker.minimum_calls", "must be > 0"));
    }
    if cb.window_secs == 0 {
        errors.push(ValidationError::new("circuit_breaker.window_secs", "must be > 0"));
    }
    if cb.half_open_probes == 0 {
        errors.push(ValidationError::new("circuit_breaker.half_open_probes", "must be > 0"));
    }
    if cb.half_open_successes_required == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.half_open_successes_required",
            "must be > 0",
        ));
    }

    if config.timeouts.request_secs.saturating_mul(1_000) <= backend.call_timeout_ms {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must exceed backend.call_timeout_ms",
        ));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
