use axum::body::Body;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ErrorBody;

/// Stamps the request path into error bodies rendered by handlers and
/// extractors, which do not know it.
pub async fn attach_request_path(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;

    let Some(mut body) = response.extensions_mut().remove::<ErrorBody>() else {
        return response;
    };
    if !body.path.is_empty() {
        response.extensions_mut().insert(body);
        return response;
    }

    body.path = path;
    let Ok(json) = serde_json::to_vec(&body) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.extensions.insert(body);
    Response::from_parts(parts, Body::from(json))
}
