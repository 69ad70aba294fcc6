//! HTTP middleware: permissive CORS (this bus has no per-origin access
//! control, only per-stream secrets) and a quiet 404 handler.

use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{Any, CorsLayer};

/// Any origin, any of the methods this surface actually uses. Access control
/// lives at the stream-secret layer, not at CORS.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "no route matched");
    StatusCode::NOT_FOUND
}
