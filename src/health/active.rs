//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Update backend liveness based on results
//!
//! This is the only path that brings a dead backend back; failover only
//! marks backends down.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::probe_tcp;
use crate::load_balancer::BackendPool;
use crate::observability::metrics;

/// Result of one health check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub up: usize,
    pub down: usize,
}

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    interval: Duration,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: &HealthCheckConfig) -> Self {
        Self {
            pool,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check every interval until shutdown. The first check runs one full
    /// interval after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe all backends concurrently and apply the results.
    pub async fn check_all(&self) -> HealthReport {
        tracing::info!("Starting health check...");

        let backends = self.pool.snapshot();
        let probes = backends.iter().map(|backend| async move {
            let result = probe_tcp(backend.endpoint(), self.timeout).await;
            (backend, result)
        });

        let mut report = HealthReport::default();
        for (backend, result) in join_all(probes).await {
            let alive = match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(backend = %backend.endpoint(), error = %e, "Site unreachable");
                    false
                }
            };

            backend.set_alive(alive);
            metrics::record_backend_health(backend.endpoint().as_str(), alive);

            if alive {
                report.up += 1;
            } else {
                report.down += 1;
            }
            tracing::info!(
                backend = %backend.endpoint(),
                status = if alive { "up" } else { "down" },
                "Health check result"
            );
        }

        tracing::info!(up = report.up, down = report.down, "Health check completed");
        report
    }
}
