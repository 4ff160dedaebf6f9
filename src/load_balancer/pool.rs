//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered set of registered backends
//! - Build each backend's forward handle at registration
//! - Apply liveness updates from health checks and failover
//! - Select peers through the shared round-robin cursor

use std::sync::Arc;

use arc_swap::ArcSwap;
use url::Url;

use crate::config::validation::validate_backend_url;
use crate::config::BackendConfig;
use crate::http::forward::Connector;
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin};

/// Shared pool of backends.
pub struct BackendPool {
    /// Append-only member list, republished whole on every registration.
    members: ArcSwap<Vec<Arc<Backend>>>,
    selector: RoundRobin,
    connector: Arc<dyn Connector>,
}

impl BackendPool {
    /// Create an empty pool.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            members: ArcSwap::from_pointee(Vec::new()),
            selector: RoundRobin::new(),
            connector,
        }
    }

    /// Create a pool and register every valid configured backend.
    pub fn from_config(configs: &[BackendConfig], connector: Arc<dyn Connector>) -> Self {
        let pool = Self::new(connector);
        for config in configs {
            match validate_backend_url(&config.url) {
                Ok(url) => {
                    pool.register(url);
                }
                Err(e) => tracing::warn!(error = %e, "Invalid backend address, skipping"),
            }
        }
        pool
    }

    /// Append a new live backend.
    pub fn register(&self, endpoint: Url) -> Arc<Backend> {
        let forwarder = self.connector.connect(&endpoint);
        let backend = Arc::new(Backend::new(endpoint, forwarder));

        self.members.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(backend.clone());
            next
        });

        tracing::info!(backend = %backend.endpoint(), "Backend registered");
        backend
    }

    /// Set liveness of the first backend with this endpoint.
    /// Returns false when no backend matches.
    pub fn mark_status(&self, endpoint: &Url, alive: bool) -> bool {
        let members = self.members.load();
        match members.iter().find(|b| b.endpoint() == endpoint) {
            Some(backend) => {
                backend.set_alive(alive);
                true
            }
            None => false,
        }
    }

    /// Current members in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Backend>>> {
        self.members.load_full()
    }

    /// Choose the next live backend, if any.
    pub fn next_peer(&self) -> Option<Arc<Backend>> {
        let members = self.members.load();
        self.selector.next_peer(&members)
    }

    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alive_count(&self) -> usize {
        self.members.load().iter().filter(|b| b.is_alive()).count()
    }
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPool")
            .field("members", &self.members.load().as_slice())
            .field("cursor", &self.selector.cursor())
            .finish_non_exhaustive()
    }
}
