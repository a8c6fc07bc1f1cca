//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {key}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: TOML file (if given), then `GATEWAY_*` environment
/// overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides using `lookup` to resolve variable names.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvOverrides { lookup };

    env.set("GATEWAY_BIND_ADDRESS", &mut config.listener.bind_address)?;

    env.set("GATEWAY_BACKEND_BASE_URL", &mut config.backend.base_url)?;
    env.set("GATEWAY_BACKEND_PATH", &mut config.backend.path)?;
    env.set("GATEWAY_BACKEND_CONNECT_TIMEOUT_MS", &mut config.backend.connect_timeout_ms)?;
    env.set("GATEWAY_BACKEND_CALL_TIMEOUT_MS", &mut config.backend.call_timeout_ms)?;
    env.set("GATEWAY_BACKEND_MAX_RESPONSE_BYTES", &mut config.backend.max_response_bytes)?;

    env.set("GATEWAY_RATE_LIMIT_CAPACITY", &mut config.rate_limit.capacity)?;
    env.set("GATEWAY_RATE_LIMIT_REFILL_PERIOD_SECS", &mut config.rate_limit.refill_period_secs)?;
    env.set("GATEWAY_RATE_LIMIT_MAX_TRACKED_CLIENTS", &mut config.rate_limit.max_tracked_clients)?;

    env.set("GATEWAY_BULKHEAD_MAX_CONCURRENT", &mut config.bulkhead.max_concurrent)?;
    env.set("GATEWAY_BULKHEAD_MAX_WAIT_MS", &mut config.bulkhead.max_wait_ms)?;

    let cb = &mut config.circuit_breaker;
    env.set("GATEWAY_CB_FAILURE_RATE_THRESHOLD", &mut cb.failure_rate_threshold)?;
    env.set("GATEWAY_CB_MINIMUM_CALLS", &mut cb.minimum_calls)?;
    env.set("GATEWAY_CB_WINDOW_SECS", &mut cb.window_secs)?;
    env.set("GATEWAY_CB_WAIT_DURATION_MS", &mut cb.wait_duration_ms)?;
    env.set("GATEWAY_CB_HALF_OPEN_PROBES", &mut cb.half_open_probes)?;
    env.set("GATEWAY_CB_HALF_OPEN_SUCCESSES", &mut cb.half_open_successes_required)?;
    env.set("GATEWAY_CB_COUNT_TIMEOUTS", &mut cb.count_timeouts_as_failures)?;
    env.set("GATEWAY_CB_RETRY_AFTER_SECS", &mut cb.retry_after_secs)?;

    env.set("GATEWAY_REQUEST_TIMEOUT_SECS", &mut config.timeouts.request_secs)?;
    env.set("GATEWAY_MAX_BODY_SIZE", &mut config.security.max_body_size)?;

    env.set("GATEWAY_LOG_LEVEL", &mut config.observability.log_level)?;
    env.set("GATEWAY_METRICS_ENABLED", &mut config.observability.metrics_enabled)?;
    env.set("GATEWAY_METRICS_ADDRESS", &mut config.observability.metrics_address)?;

    Ok(())
}

struct EnvOverrides<F> {
    lookup: F,
}

impl<F> EnvOverrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn set<T: FromStr>(&self, key: &'static str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(raw) = (self.lookup)(key) {
            *target = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { key, value: raw.clone() })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [rate_limit]
            capacity = 3

            [backend]
            base_url = "http://127.0.0.1:5000"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.capacity, 3);
        assert_eq!(config.rate_limit.refill_period_secs, 3_600);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.path, "/recommendations");
        assert_eq!(config.circuit_breaker.retry_after_secs, 10);
    }

    #[test]
    fn env_overrides_win() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("GATEWAY_RATE_LIMIT_CAPACITY", "5"),
                ("GATEWAY_BULKHEAD_MAX_CONCURRENT", " 2 "),
                ("GATEWAY_CB_COUNT_TIMEOUTS", "true"),
                ("GATEWAY_BACKEND_BASE_URL", "http://backend:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.bulkhead.max_concurrent, 2);
        assert!(config.circuit_breaker.count_timeouts_as_failures);
        assert_eq!(config.backend.base_url, "http://backend:9000");
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(
            &mut config,
            lookup_from(&[("GATEWAY_CB_MINIMUM_CALLS", "many")]),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Env { key: "GATEWAY_CB_MINIMUM_CALLS", .. }));
    }
}
