pub mod config;
pub mod error;
pub mod handlers;
pub mod mcp;
pub mod services;
pub mod tools;

use axum::{
    http::{header, HeaderName},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::mcp::{http_transport, SessionRegistry};

/// Build the full application router around a session registry.
///
/// Panics are caught innermost and answered with a JSON-RPC internal error.
pub fn build_app(sessions: SessionRegistry) -> Router {
    let session_header = HeaderName::from_static(http_transport::SESSION_HEADER);

    // Expose the session header to browser clients
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CACHE_CONTROL,
            session_header.clone(),
            HeaderName::from_static("mcp-protocol-version"),
        ])
        .expose_headers([session_header])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(http_transport::router(sessions))
        .layer(CatchPanicLayer::custom(http_transport::panic_response))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}
