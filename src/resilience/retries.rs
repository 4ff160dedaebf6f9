//! Retry limits and per-request failover counters.
//!
//! # Responsibilities
//! - Hold the numeric failover policy (retry limit, backoff, attempt limit)
//! - Track the counters of one logical request as it moves between backends
//!
//! # Design Decisions
//! - Counters are a plain value threaded through dispatch, never ambient
//! - `retry_count` is per backend and resets on reroute
//! - `attempt_count` starts at 1 and is checked with `>` before dispatch,
//!   so the limit is only hit once it has grown strictly past `max_attempts`

use crate::config::FailoverConfig;
use crate::resilience::backoff::Backoff;

/// Failover limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    /// Same-backend retries allowed before the backend is marked down.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Dispatch refuses once `attempt_count > max_attempts`.
    pub max_attempts: u32,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::from(&FailoverConfig::default())
    }
}

impl From<&FailoverConfig> for FailoverPolicy {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Backoff::constant_ms(config.retry_backoff_ms),
            max_attempts: config.max_attempts,
        }
    }
}

/// Counters for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverContext {
    /// Retries against the current backend.
    pub retry_count: u32,
    /// Distinct backends tried, starting at 1.
    pub attempt_count: u32,
}

impl FailoverContext {
    pub fn new() -> Self {
        Self {
            retry_count: 0,
            attempt_count: 1,
        }
    }

    pub fn can_retry(&self, policy: &FailoverPolicy) -> bool {
        self.retry_count < policy.max_retries
    }

    pub fn attempts_exhausted(&self, policy: &FailoverPolicy) -> bool {
        self.attempt_count > policy.max_attempts
    }

    /// Move to a new backend: one more attempt, fresh retry budget.
    pub fn next_attempt(&mut self) {
        self.attempt_count += 1;
        self.retry_count = 0;
    }
}

impl Default for FailoverContext {
    fn default() -> Self {
        Self::new()
    }
}
