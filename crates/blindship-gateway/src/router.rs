//! Router assembly and the HTTP listener.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use blindship_config::{BrokerConfig, CorsSection};
use blindship_telemetry::RequestContext;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::handlers;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the broker's router with every endpoint mounted under `base_path`.
#[must_use]
pub fn router(state: AppState, base_path: &str, cors: &CorsSection) -> Router {
    let api = Router::new()
        .route("/resolve", post(handlers::resolve))
        .route("/create", post(handlers::create))
        .route("/tracking", post(handlers::tracking))
        .route("/track", post(handlers::track))
        .route("/health", get(handlers::health))
        .fallback(handlers::unknown_endpoint);

    let app = if base_path.is_empty() || base_path == "/" {
        api
    } else {
        Router::new()
            .nest(base_path, api)
            .fallback(handlers::unknown_endpoint)
    };

    app.layer(middleware::from_fn(request_context))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors)),
        )
        .with_state(state)
}

fn cors_layer(cors: &CorsSection) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if cors.is_wildcard() {
        warn!("CORS allows any origin; set cors.allowed_origins to restrict it");
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %origin, "Ignoring malformed CORS origin");
                None
            },
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Runs each request inside a [`RequestContext`] span and echoes the
/// request id back.
async fn request_context(request: Request, next: Next) -> Response {
    let mut ctx = RequestContext::new("gateway")
        .with_method(request.method().as_str())
        .with_operation(request.uri().path());
    if let Some(id) = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
    {
        ctx = ctx.with_request_id(id);
    }
    if let Some(carrier) = request
        .headers()
        .get("x-carrier-id")
        .and_then(|v| v.to_str().ok())
    {
        ctx = ctx.with_carrier(carrier);
    }

    let span = ctx.span();
    let mut response = next.run(request).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    span.in_scope(|| {
        debug!(
            status = response.status().as_u16(),
            elapsed_ms = ctx.elapsed_ms(),
            "Request completed"
        );
    });
    response
}

/// Bind `config.server.bind` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, config: &BrokerConfig) -> GatewayResult<()> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| GatewayError::Internal(format!("server.bind: {e}")))?;
    let app = router(state.clone(), &config.server.base_path, &config.cors);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Internal(format!("bind {addr}: {e}")))?;
    info!(
        %addr,
        base_path = %config.server.base_path,
        carriers = ?state.authenticator.registry().ids(),
        "Blindship broker listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Internal(format!("server: {e}")))?;
    info!("Blindship broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
