//! Failover orchestration.
//!
//! # States
//! - Forwarding: request relayed to the chosen backend
//! - RetryingSameBackend: forward failed, retry budget left for this backend
//! - ReroutingToNewBackend: retry budget spent, backend marked down
//! - Exhausted: attempt budget spent or no live backend (503)
//! - Completed: a backend produced a response head
//!
//! # State Transitions
//! ```text
//! Forwarding → Completed: forward succeeds
//! Forwarding → RetryingSameBackend: error, retry_count < max_retries
//! RetryingSameBackend → Forwarding: after constant backoff, same backend
//! Forwarding → ReroutingToNewBackend: error, retry_count == max_retries
//! ReroutingToNewBackend → Forwarding: attempt_count <= max_attempts, peer found
//! ReroutingToNewBackend → Exhausted: attempt_count > max_attempts, or no peer
//! ```
//!
//! # Design Decisions
//! - Only transport errors enter the state machine; once a response head is
//!   returned its body streams to the caller and is never retried
//! - Marking a backend down is visible to every later selection
//! - The backoff sleep suspends only the request being retried

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use url::Url;

use crate::http::forward::{ForwardError, ProxyRequest};
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;
use crate::resilience::retries::{FailoverContext, FailoverPolicy};

/// Where a request currently is in the failover state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    Forwarding,
    RetryingSameBackend,
    ReroutingToNewBackend,
    Exhausted,
    Completed,
}

/// Decision taken after a failed forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wait `delay`, then forward to the same backend again.
    Retry { delay: Duration },
    /// Backend is marked down; dispatch to a different one.
    Reroute,
}

impl Transition {
    pub fn state(&self) -> FailoverState {
        match self {
            Transition::Retry { .. } => FailoverState::RetryingSameBackend,
            Transition::Reroute => FailoverState::ReroutingToNewBackend,
        }
    }
}

/// Why a request was answered with 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NoLiveBackend,
    AttemptsExhausted,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::NoLiveBackend => "no_live_backend",
            UnavailableReason::AttemptsExhausted => "attempts_exhausted",
        }
    }
}

/// Terminal result of one dispatched request.
#[derive(Debug)]
pub enum DispatchOutcome {
    Completed {
        backend: Url,
        response: Response<Body>,
        context: FailoverContext,
    },
    Unavailable {
        reason: UnavailableReason,
        context: FailoverContext,
    },
}

impl DispatchOutcome {
    pub fn state(&self) -> FailoverState {
        match self {
            DispatchOutcome::Completed { .. } => FailoverState::Completed,
            DispatchOutcome::Unavailable { .. } => FailoverState::Exhausted,
        }
    }

    pub fn context(&self) -> FailoverContext {
        match self {
            DispatchOutcome::Completed { context, .. }
            | DispatchOutcome::Unavailable { context, .. } => *context,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Completed { response, .. } => response.status(),
            DispatchOutcome::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Backend that served the request, or "none".
    pub fn backend_label(&self) -> String {
        match self {
            DispatchOutcome::Completed { backend, .. } => backend.to_string(),
            DispatchOutcome::Unavailable { .. } => "none".to_string(),
        }
    }

    pub fn into_response(self) -> Response<Body> {
        match self {
            DispatchOutcome::Completed { response, .. } => response,
            DispatchOutcome::Unavailable { .. } => service_unavailable(),
        }
    }
}

/// The terminal 503 answer.
pub fn service_unavailable() -> Response<Body> {
    (StatusCode::SERVICE_UNAVAILABLE, "Service not available").into_response()
}

/// Handle a failed forward to `backend`.
///
/// Either spends one same-backend retry, or marks this backend record down
/// and moves the request to its next attempt.
pub fn on_forward_error(
    policy: &FailoverPolicy,
    backend: &Backend,
    error: &ForwardError,
    ctx: &mut FailoverContext,
    request: &ProxyRequest,
) -> Transition {
    let endpoint = backend.endpoint();
    tracing::warn!(
        request_id = %request.request_id(),
        backend = %endpoint,
        error = %error,
        "Upstream error"
    );

    if ctx.can_retry(policy) {
        ctx.retry_count += 1;
        let delay = policy.backoff.delay(ctx.retry_count);
        tracing::info!(
            request_id = %request.request_id(),
            backend = %endpoint,
            retry = ctx.retry_count,
            attempt = ctx.attempt_count,
            delay = ?delay,
            "Retrying same backend"
        );
        metrics::record_retry(endpoint.as_str());
        return Transition::Retry { delay };
    }

    backend.set_alive(false);
    tracing::warn!(
        request_id = %request.request_id(),
        client = ?request.client_addr(),
        path = %request.uri().path(),
        backend = %endpoint,
        retries = ctx.retry_count,
        attempt = ctx.attempt_count,
        "Backend marked down, rerouting"
    );
    metrics::record_reroute(endpoint.as_str());
    ctx.next_attempt();
    Transition::Reroute
}

/// Entry point of the core: select, forward, fail over.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<BackendPool>,
    policy: FailoverPolicy,
}

impl Dispatcher {
    pub fn new(pool: Arc<BackendPool>, policy: FailoverPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    /// Serve one logical request, producing a response or a 503 decision.
    pub async fn dispatch(&self, request: &ProxyRequest) -> DispatchOutcome {
        let mut ctx = FailoverContext::new();

        loop {
            let backend = match self.select(&ctx, request) {
                Ok(backend) => backend,
                Err(reason) => {
                    metrics::record_unavailable(reason.as_str());
                    return DispatchOutcome::Unavailable { reason, context: ctx };
                }
            };

            loop {
                let started = Instant::now();
                match backend.forward(request).await {
                    Ok(response) => {
                        tracing::debug!(
                            request_id = %request.request_id(),
                            backend = %backend.endpoint(),
                            status = %response.status(),
                            elapsed = ?started.elapsed(),
                            "Forwarded"
                        );
                        return DispatchOutcome::Completed {
                            backend: backend.endpoint().clone(),
                            response,
                            context: ctx,
                        };
                    }
                    Err(error) => {
                        let transition =
                            on_forward_error(&self.policy, &backend, &error, &mut ctx, request);
                        match transition {
                            Transition::Retry { delay } => tokio::time::sleep(delay).await,
                            Transition::Reroute => break,
                        }
                    }
                }
            }
        }
    }

    fn select(
        &self,
        ctx: &FailoverContext,
        request: &ProxyRequest,
    ) -> Result<Arc<Backend>, UnavailableReason> {
        if ctx.attempts_exhausted(&self.policy) {
            tracing::warn!(
                request_id = %request.request_id(),
                client = ?request.client_addr(),
                path = %request.uri().path(),
                attempt = ctx.attempt_count,
                "Max attempts reached, terminating"
            );
            return Err(UnavailableReason::AttemptsExhausted);
        }

        self.pool.next_peer().ok_or_else(|| {
            tracing::warn!(
                request_id = %request.request_id(),
                path = %request.uri().path(),
                attempt = ctx.attempt_count,
                backends = self.pool.len(),
                "No live backend available"
            );
            UnavailableReason::NoLiveBackend
        })
    }
}
