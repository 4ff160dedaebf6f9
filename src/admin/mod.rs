//! Admin API.
//!
//! # Responsibilities
//! - Register new backends into the live pool at runtime
//! - Report backend liveness and process status
//!
//! # Design Decisions
//! - Served on its own listener, separate from proxied traffic
//! - Bearer-token auth only when an API key is configured

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::load_balancer::BackendPool;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub api_key: Option<String>,
}

impl AdminState {
    /// An empty key disables auth.
    pub fn new(pool: Arc<BackendPool>, api_key: &str) -> Self {
        let api_key = (!api_key.is_empty()).then(|| api_key.to_string());
        Self { pool, api_key }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/urls/register", post(register_backends))
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
