//! Shared helpers for driving the broker over HTTP.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use blindship_test::{TEST_BASE_PATH, carrier_key};
use serde_json::Value;
use tower::ServiceExt;

/// A response reduced to what the tests assert on.
#[allow(dead_code)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub request_id: Option<String>,
}

#[allow(dead_code)]
impl Reply {
    /// The `error` code of an error envelope.
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// Send one request through `router`.
pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        body,
        request_id,
    }
}

/// `POST {base}{endpoint}` with `body` and no credential headers.
#[allow(dead_code)]
pub async fn post(router: &Router, endpoint: &str, body: &Value) -> Reply {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{TEST_BASE_PATH}{endpoint}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

/// `POST {base}{endpoint}` authenticated as `carrier` via headers.
#[allow(dead_code)]
pub async fn post_as(router: &Router, carrier: &str, endpoint: &str, body: &Value) -> Reply {
    post_with_key(router, carrier, &carrier_key(carrier), endpoint, body).await
}

/// `POST {base}{endpoint}` presenting an explicit carrier key.
#[allow(dead_code)]
pub async fn post_with_key(
    router: &Router,
    carrier: &str,
    key: &str,
    endpoint: &str,
    body: &Value,
) -> Reply {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{TEST_BASE_PATH}{endpoint}"))
        .header("content-type", "application/json")
        .header("x-carrier-id", carrier)
        .header("x-carrier-key", key)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}
