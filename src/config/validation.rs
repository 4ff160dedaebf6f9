//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend URLs (parseable, plain http, host present)
//! - Validate value ranges (intervals > 0, bind addresses parse)
//! - Keep the request deadline above the worst-case failover budget
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backend url `{url}` is invalid: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("backend url `{url}` uses unsupported scheme `{scheme}` (only http is proxied)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("backend url `{0}` has no host")]
    MissingHost(String),

    #[error("{field} `{value}` is not a valid socket address")]
    InvalidBindAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("timeouts.request_secs ({request_secs}s) is below the failover budget ({budget:?})")]
    RequestDeadlineTooShort { request_secs: u64, budget: Duration },
}

/// Parse and check a single backend URL.
pub fn validate_backend_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidBackendUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost(raw.to_string()));
    }

    Ok(url)
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    for backend in &config.backends {
        if let Err(e) = validate_backend_url(&backend.url) {
            errors.push(e);
        }
    }

    let non_zero = [
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("failover.max_attempts", u64::from(config.failover.max_attempts)),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let budget = failover_budget(config);
    let deadline = Duration::from_secs(config.timeouts.request_secs);
    if config.timeouts.request_secs > 0 && deadline < budget {
        errors.push(ValidationError::RequestDeadlineTooShort {
            request_secs: config.timeouts.request_secs,
            budget,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest a single request can spend in failover: every allowed backend
/// exhausts its retries, each forward running to the upstream timeout.
pub fn failover_budget(config: &ProxyConfig) -> Duration {
    let failover = &config.failover;
    let backends = u64::from(failover.max_attempts) + 1;
    let forwards = u64::from(failover.max_retries) + 1;
    let per_backend_ms = forwards
        .saturating_mul(config.timeouts.upstream_secs.saturating_mul(1000))
        .saturating_add(u64::from(failover.max_retries).saturating_mul(failover.retry_backoff_ms));
    Duration::from_millis(backends.saturating_mul(per_backend_ms))
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}
