//! Router assembly with the shared middleware stack.

use std::time::Duration;

use axum::http::HeaderName;
use axum::routing::{any, get};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::state::AppState;

/// Build the application router.
///
/// The five protocol endpoints are registered with `any` so that a wrong
/// method reaches the handler and earns the wire-level envelope (400, code
/// −1) instead of a bare 405.
pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = Duration::from_millis(state.config.http_server.write_timeout_ms);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/put_image", any(handlers::put_image))
        .route("/api/v1/put_faces_data", any(handlers::put_faces_data))
        .route("/api/v1/put_control", any(handlers::put_control))
        .route("/api/v1/add_control_object", any(handlers::add_control_object))
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
