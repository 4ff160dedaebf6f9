//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → proxy server stops accepting and drains
//!             → admin server stops accepting and drains
//!             → health monitor loop exits
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
