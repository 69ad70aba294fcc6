//! Tiny embedded landing page and machine-readable surface description.
//! This bus has no bundled frontend; `/` exists only because a server that
//! binds a port should answer something.

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, Uri, header};
use axum::response::Response;
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

pub async fn serve_assets(uri: Uri) -> Response<Body> {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(file) = Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let etag = hex::encode(file.metadata.sha256_hash());
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime.as_ref())
            .header(header::CACHE_CONTROL, "public, max-age=0, must-revalidate")
            .header(header::ETAG, format!("\"{}\"", etag))
            .body(Body::from(file.data.into_owned()))
            .unwrap();
    }

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from("404 Not Found"))
        .unwrap()
}

pub async fn describe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "malten",
        "endpoints": [
            {"method": "GET", "path": "/streams", "description": "list public streams"},
            {"method": "POST", "path": "/streams", "description": "create a stream"},
            {"method": "GET", "path": "/messages", "description": "retrieve message history"},
            {"method": "POST", "path": "/messages", "description": "post a message"},
            {"method": "POST", "path": "/commands", "description": "post a command, await its result"},
            {"method": "GET", "path": "/events", "description": "subscribe via WebSocket or SSE"},
        ],
    }))
}
