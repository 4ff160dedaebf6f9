//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect with timeout, per backend)
//!     → backend.set_alive(up/down) on each probed record
//!
//! Passive detection (resilience::failover):
//!     Forward fails after the retry budget
//!     → backend.set_alive(false) on the failing record
//! ```
//!
//! # Design Decisions
//! - Both paths write the same per-backend flag; last write wins
//! - A single probe result flips liveness, no thresholds
//! - Probe failures are logged, never escalated

pub mod active;
pub mod probe;

pub use active::{HealthMonitor, HealthReport};
