//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track liveness (shared by health checks and failover)
//! - Own the forward handle used to relay requests to it

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Body;
use axum::http::Response;
use futures_util::future::BoxFuture;
use url::Url;

use crate::http::forward::{Forward, ForwardError, ProxyRequest};

/// A single backend server.
pub struct Backend {
    /// Base URL of the backend. Never changes after construction.
    endpoint: Url,
    /// Current liveness belief.
    alive: AtomicBool,
    forwarder: Box<dyn Forward>,
}

impl Backend {
    /// Create a new backend, initially alive.
    pub fn new(endpoint: Url, forwarder: Box<dyn Forward>) -> Self {
        Self {
            endpoint,
            alive: AtomicBool::new(true),
            forwarder,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Set liveness, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Relay `request` to this backend.
    pub fn forward<'a>(
        &'a self,
        request: &'a ProxyRequest,
    ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>> {
        self.forwarder.forward(request)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("endpoint", &self.endpoint.as_str())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
