use std::net::SocketAddr;

use applyflow_core::client::FORWARDED_FOR_HEADER;
use applyflow_core::{client_key, Admission, RouteClass};
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// First gate for every request. A denied request is answered here and
/// never reaches routing, authentication or a handler.
pub async fn rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let forwarded_for = req
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let client = client_key(
        forwarded_for,
        peer,
        state.config.rate_limit.trust_forwarded_for,
    );
    let class = RouteClass::classify(req.uri().path());

    match state.limiter.admit(&client, class) {
        Admission::Allowed => next.run(req).await,
        Admission::Denied { retry_after } => {
            tracing::warn!(
                client = %client,
                class = class.as_str(),
                path = %req.uri().path(),
                "rate limit exceeded"
            );
            AppError::RateLimited { retry_after }.into_response_at(req.uri().path())
        }
    }
}
