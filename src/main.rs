//! failover-proxy
//!
//! An HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ http::server ──▶ resilience::failover      │
//!                          │                     │  select / retry / reroute
//!                          │                     ▼                        │
//!                          │               load_balancer::pool            │
//!                          │               (round robin, liveness)        │
//!                          │                     │                        │
//!     Client Response      │                     ▼                        │
//!     ◀────────────────────┼── http::forward ◀── backend ◀────────────────┼──── Backend
//!                          │                                              │
//!                          │  health::active ── TCP probes ──▶ pool       │
//!                          │  admin ── POST /urls/register ──▶ pool       │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use failover_proxy::admin::{serve_admin, AdminState};
use failover_proxy::config::loader::load_config;
use failover_proxy::config::validation::validate_config;
use failover_proxy::config::{BackendConfig, ProxyConfig};
use failover_proxy::http::HttpServer;
use failover_proxy::lifecycle::{signals, Shutdown};
use failover_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "failover-proxy")]
#[command(about = "HTTP load balancer with health checks and failover", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Backend URL, repeatable; appended to configured backends
    #[arg(long = "backend")]
    backends: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    config
        .backends
        .extend(args.backends.into_iter().map(BackendConfig::new));
    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init(&config.observability);
    tracing::info!("failover-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        health_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let admin = config.admin.clone();
    let server = HttpServer::new(config);

    if admin.enabled {
        let admin_listener = TcpListener::bind(&admin.bind_address).await?;
        let state = AdminState::new(Arc::clone(server.pool()), &admin.api_key);
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(admin_listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
