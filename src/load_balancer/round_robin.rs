//! Round-robin peer selection with dead-peer skipping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Round-robin selector.
/// Stores the shared rotation cursor for its pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw cursor value.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Pick the next live backend, starting one past the cursor.
    ///
    /// When dead backends had to be skipped to find one, the cursor is moved
    /// forward to the chosen position so the next call resumes after it.
    pub fn next_peer(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        let len = backends.len() as u64;
        let start = self.cursor.fetch_add(1, Ordering::AcqRel).wrapping_add(1);

        for offset in 0..len {
            let position = start.wrapping_add(offset);
            let backend = &backends[(position % len) as usize];
            if backend.is_alive() {
                if offset != 0 {
                    // Same index modulo len, but the cursor never moves backwards.
                    self.cursor.fetch_max(position, Ordering::AcqRel);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}
