use axum::{
    body::Body,
    http::{Extensions, HeaderValue, Request, Response},
    middleware::Next,
};
use std::time::Instant;
use tower_http::trace::MakeSpan;
use tracing::{info, warn, Span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn request_id(extensions: &Extensions) -> &str {
    extensions
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("-")
}

/// Reuses a caller-supplied `x-request-id`, otherwise mints one.
pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response<Body> {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// One line per request, tagged with the id set by [`request_id_middleware`].
pub async fn access_log_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();
    let request_id = request_id(req.extensions()).to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        warn!(%request_id, %method, %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else {
        info!(%request_id, %method, %path, status = status.as_u16(), elapsed_ms, "Request served");
    }

    response
}

#[derive(Clone)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id(request.extensions()),
        )
    }
}
