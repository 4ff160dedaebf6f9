//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body buffering)
//!     → [resilience::failover picks a backend and fails over]
//!     → forward.rs (rewrite and relay to the backend)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::{Connector, Forward, ForwardError, HyperConnector, ProxyRequest};
pub use request::{ProxyRequestId, X_REQUEST_ID};
pub use server::HttpServer;
