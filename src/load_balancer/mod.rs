//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request dispatched
//!     → pool.rs (current member snapshot)
//!     → round_robin.rs (rotate from shared cursor, skip dead backends)
//!     → backend.rs (forward handle of the chosen backend)
//!     → Return backend or "none available"
//! ```
//!
//! # Design Decisions
//! - One pool instance shared via Arc; no process-wide globals
//! - Liveness is per-backend atomic state, never a pool-wide lock
//! - The member list is append-only and read lock-free
//! - Dead backends are skipped, not removed

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use pool::BackendPool;
pub use round_robin::RoundRobin;
