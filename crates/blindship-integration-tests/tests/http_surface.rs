//! Routing, envelopes and headers shared by every endpoint.

mod common;

use axum::body::Body;
use axum::http::{Method, Request};
use blindship_gateway::AVAILABLE_ENDPOINTS;
use blindship_test::prelude::*;
use common::{post, send};
use serde_json::json;

async fn broker() -> TestBroker {
    TestBroker::builder()
        .with_fake(FakeCarrier::new("acme"))
        .build()
        .await
}

#[tokio::test]
async fn test_unknown_endpoint_lists_available() {
    let broker = broker().await;
    let router = broker.router();

    let reply = post(&router, "/label", &json!({})).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.error(), "unknown_endpoint");
    assert_eq!(
        reply.body["details"]["available_endpoints"],
        json!(AVAILABLE_ENDPOINTS)
    );

    let outside = send(
        &router,
        Request::builder()
            .method(Method::GET)
            .uri("/elsewhere")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(outside.status, 404);
    assert_eq!(outside.error(), "unknown_endpoint");
}

#[tokio::test]
async fn test_health_lists_carriers() {
    let broker = broker().await;
    let router = broker.router();

    let reply = send(
        &router,
        Request::builder()
            .uri(format!("{TEST_BASE_PATH}/health"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["status"], "ok");
    assert_eq!(reply.body["carriers"], json!(["acme"]));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let broker = broker().await;
    let router = broker.router();
    let id = "6f1c1a4e-4c1b-4f6a-9a53-2f0e5b1f9d10";

    let reply = send(
        &router,
        Request::builder()
            .uri(format!("{TEST_BASE_PATH}/health"))
            .header("x-request-id", id)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reply.request_id.as_deref(), Some(id));

    // A fresh id is minted otherwise.
    let fresh = post(&router, "/resolve", &json!({})).await;
    assert!(fresh.request_id.is_some_and(|v| v != id));
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
    let broker = broker().await;
    let router = broker.router();

    let response = tower::ServiceExt::oneshot(
        router,
        Request::builder()
            .method(Method::OPTIONS)
            .uri(format!("{TEST_BASE_PATH}/resolve"))
            .header("origin", "https://shop.example")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "x-carrier-id,x-carrier-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_errors_share_one_envelope() {
    let broker = broker().await;
    let router = broker.router();

    for endpoint in ["/resolve", "/create", "/tracking", "/track"] {
        let reply = post(&router, endpoint, &json!({})).await;
        assert_eq!(reply.status, 400, "{endpoint}");
        assert_eq!(reply.error(), "missing_parameters", "{endpoint}");
        assert!(reply.body["details"]["required"].is_array(), "{endpoint}");
    }
}
