//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the recommendation gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream recommendation backend.
    pub backend: BackendConfig,

    /// Per-client token bucket settings.
    pub rate_limit: RateLimitConfig,

    /// Bulkhead (bounded concurrency) settings.
    pub bulkhead: BulkheadConfig,

    /// Circuit breaker settings for the backend.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend endpoint and transport timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the recommendation backend (e.g., "http://ml:5000").
    pub base_url: String,

    /// Path the recommendation request is posted to.
    pub path: String,

    /// TCP connect timeout in milliseconds. Must be below `call_timeout_ms`.
    pub connect_timeout_ms: u64,

    /// Deadline for the whole exchange (connect, send, read body) in milliseconds.
    pub call_timeout_ms: u64,

    /// Largest accepted response body in bytes.
    pub max_response_bytes: usize,
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ml:5000".to_string(),
            path: "/recommendations".to_string(),
            connect_timeout_ms: 1_000,
            call_timeout_ms: 4_000,
            max_response_bytes: 256 * 1024,
        }
    }
}

/// Per-client rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst per client).
    pub capacity: u32,

    /// Time for an empty bucket to refill completely, in seconds.
    pub refill_period_secs: u64,

    /// Maximum number of client buckets kept in memory.
    pub max_tracked_clients: usize,
}

impl RateLimitConfig {
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs(self.refill_period_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            refill_period_secs: 3_600,
            max_tracked_clients: 10_000,
        }
    }
}

/// Bulkhead configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Maximum concurrent in-flight backend calls.
    pub max_concurrent: usize,

    /// How long a request may wait for a free slot. Zero rejects immediately.
    pub max_wait_ms: u64,
}

impl BulkheadConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 25,
            max_wait_ms: 0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate (percent) at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Minimum outcomes in the window before the failure rate is evaluated.
    pub minimum_calls: u32,

    /// Length of the rolling outcome window in seconds.
    pub window_secs: u64,

    /// Time spent open before a probe is let through, in milliseconds.
    pub wait_duration_ms: u64,

    /// Concurrent probes admitted while half-open.
    pub half_open_probes: u32,

    /// Probe successes required to close again.
    pub half_open_successes_required: u32,

    /// Whether backend timeouts count as breaker failures.
    pub count_timeouts_as_failures: bool,

    /// Retry-After hint (seconds) for circuit-open and unreachable responses.
    pub retry_after_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn wait_duration(&self) -> Duration {
        Duration::from_millis(self.wait_duration_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            minimum_calls: 10,
            window_secs: 60,
            wait_duration_ms: 10_000,
            half_open_probes: 3,
            half_open_successes_required: 3,
            count_timeouts_as_failures: false,
            retry_after_secs: 10,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard ceiling on a whole inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}
