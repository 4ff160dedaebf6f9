//! End-to-end failover tests against real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use failover_proxy::config::validation::validate_config;

mod common;

#[tokio::test]
async fn test_passthrough() {
    let backend = common::start_mock_backend("Hello from backend").await;
    let proxy = common::start_proxy(common::proxy_config(&[backend])).await;

    let res = common::client().get(proxy.url("/hello?x=1")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Hello from backend");
}

#[tokio::test]
async fn test_dead_backend_is_marked_down_and_traffic_reroutes() {
    let dead = common::closed_addr();
    let live = common::start_mock_backend("live").await;
    let proxy = common::start_proxy(common::proxy_config(&[dead, live])).await;
    let client = common::client();

    for _ in 0..4 {
        let res = client.get(proxy.url("/")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "live");
    }

    let members = proxy.pool.snapshot();
    assert!(!members[0].is_alive(), "refusing backend should be marked down");
    assert!(members[1].is_alive());
}

#[tokio::test]
async fn test_all_backends_dead_returns_503() {
    let config = common::proxy_config(&[common::closed_addr(), common::closed_addr()]);
    let proxy = common::start_proxy(config).await;

    let res = common::client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "Service not available");
    assert_eq!(proxy.pool.alive_count(), 0);

    // Nothing live is left, so the next request is refused without forwarding.
    let res = common::client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_upstream_errors_are_relayed_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (500, "boom".to_string())
        }
    })
    .await;
    let proxy = common::start_proxy(common::proxy_config(&[backend])).await;

    let res = common::client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await.unwrap(), "boom");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(proxy.pool.snapshot()[0].is_alive());
}

#[tokio::test]
async fn test_round_robin_distribution() {
    let mut addrs = Vec::new();
    for name in ["a", "b", "c"] {
        addrs.push(common::start_mock_backend(name).await);
    }
    let proxy = common::start_proxy(common::proxy_config(&addrs)).await;
    let client = common::client();

    let mut seen = Vec::new();
    for _ in 0..9 {
        let res = client.get(proxy.url("/")).send().await.unwrap();
        seen.push(res.text().await.unwrap());
    }

    for name in ["a", "b", "c"] {
        assert_eq!(seen.iter().filter(|s| *s == name).count(), 3, "uneven spread: {seen:?}");
    }
    // The first request goes to the second backend.
    assert_eq!(seen[..3], ["b", "c", "a"]);
}

#[tokio::test]
async fn test_health_check_revives_backend() {
    let live = common::start_mock_backend("back").await;
    let mut config = common::proxy_config(&[live]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    let proxy = common::start_proxy(config).await;
    proxy.pool.snapshot()[0].set_alive(false);

    let res = common::client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let res = common::client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "back");
}

#[tokio::test]
async fn test_hanging_backends_end_in_503_not_timeout() {
    let hanging = [
        common::start_hanging_backend().await,
        common::start_hanging_backend().await,
    ];
    let mut config = common::proxy_config(&hanging);
    config.timeouts.upstream_secs = 1;
    config.failover.max_retries = 0;
    config.timeouts.request_secs = 4;
    assert!(validate_config(&config).is_ok());
    let proxy = common::start_proxy(config).await;

    let started = std::time::Instant::now();
    let res = common::client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "Service not available");
    assert_eq!(proxy.pool.alive_count(), 0, "both backends should be marked down");
    assert!(started.elapsed() < Duration::from_secs(4));
}
