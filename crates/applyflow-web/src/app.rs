use axum::http::{header, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::middleware::{rate_limit, request_path, security_headers};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Assembles the router and its layer stack.
///
/// Outermost first: tracing, security headers, rate limiting, error-path
/// stamping, CORS, body limit, then routing. Authentication happens inside
/// handlers through the [`AuthUser`](crate::auth::middleware::AuthUser)
/// extractor, so it only runs for requests the limiter admitted.
pub fn build_app(state: AppState) -> Router {
    // CORS: same-origin only by default (no cross-origin requests allowed)
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let base_router = Router::new()
        .route("/health", axum::routing::get(api::health))
        .nest("/api", api::auth_router().merge(api::protected_router()))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(from_fn(request_path::attach_request_path))
        .layer(from_fn_with_state(state.clone(), rate_limit::rate_limit));

    if state.config.tls.is_enabled() {
        base_router
            .layer(from_fn(security_headers::security_headers_with_hsts))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    } else {
        base_router
            .layer(from_fn(security_headers::security_headers))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
