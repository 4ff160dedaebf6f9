//! Admin API tests over a real listener.

use std::time::Duration;

use axum::http::StatusCode;
use failover_proxy::admin::{serve_admin, AdminState};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_register_backend_at_runtime() {
    let proxy = common::start_proxy(common::proxy_config(&[])).await;
    let client = common::client();

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let admin_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let state = AdminState::new(proxy.pool.clone(), "secret");
    tokio::spawn(serve_admin(admin_listener, state, proxy.shutdown.subscribe()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let backend = common::start_mock_backend("registered").await;
    let body = json!({ "backends": [{ "url": format!("http://{backend}") }] });

    let unauthorized = client
        .post(format!("http://{admin_addr}/urls/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("http://{admin_addr}/urls/register"))
        .bearer_auth("secret")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "registered");

    let listed: Value = client
        .get(format!("http://{admin_addr}/admin/backends"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["alive"], true);
}
