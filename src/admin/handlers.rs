use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::validation::validate_backend_url;
use crate::config::BackendConfig;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends: usize,
    pub alive: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendStatus {
    pub url: String,
    pub alive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub backends: Vec<BackendConfig>,
}

#[derive(Serialize)]
pub struct RegisterErrors {
    pub errors: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backends: state.pool.len(),
        alive: state.pool.alive_count(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .snapshot()
        .iter()
        .map(|b| BackendStatus {
            url: b.endpoint().to_string(),
            alive: b.is_alive(),
        })
        .collect();

    Json(statuses)
}

/// Add backends to the live pool. Nothing is registered unless every URL
/// is valid.
pub async fn register_backends(
    State(state): State<AdminState>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let mut urls = Vec::with_capacity(payload.backends.len());
    let mut errors = Vec::new();
    for backend in &payload.backends {
        match validate_backend_url(&backend.url) {
            Ok(url) => urls.push(url),
            Err(e) => errors.push(e.to_string()),
        }
    }

    if !errors.is_empty() {
        tracing::warn!(errors = ?errors, "Rejected backend registration");
        return (StatusCode::BAD_REQUEST, Json(RegisterErrors { errors })).into_response();
    }

    for url in urls {
        state.pool.register(url);
    }
    tracing::info!(
        count = payload.backends.len(),
        total = state.pool.len(),
        "Backends registered via admin API"
    );

    Json(payload).into_response()
}
