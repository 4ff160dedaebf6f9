//! Retry backoff.

use std::time::Duration;

/// Delay applied before a same-backend retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant(Duration),
}

impl Backoff {
    pub fn constant_ms(ms: u64) -> Self {
        Backoff::Constant(Duration::from_millis(ms))
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, _retry: u32) -> Duration {
        match self {
            Backoff::Constant(d) => *d,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::constant_ms(10)
    }
}
