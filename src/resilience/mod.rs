//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → failover.rs (select, forward, decide retry or reroute)
//!     → On transport error: retries.rs (retry and attempt budgets)
//!     → backoff.rs (delay before the next same-backend retry)
//! ```
//!
//! # Design Decisions
//! - Every request carries its own failover context; nothing is shared
//!   between requests except the pool
//! - Exhaustion is a value (503 outcome), never a panic

pub mod backoff;
pub mod failover;
pub mod retries;

pub use failover::{DispatchOutcome, Dispatcher};
pub use retries::{FailoverContext, FailoverPolicy};
