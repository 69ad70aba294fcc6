//! `GET/POST /streams` — stream listing and creation.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Form, State};
use serde::{Deserialize, Serialize};

use crate::api::server::AppState;
use crate::api::types::{ApiError, validate_stream_id};
use crate::engine::StreamSummary;

pub async fn list(State(state): State<AppState>) -> Json<HashMap<String, StreamSummary>> {
    let map = state
        .engine
        .list_streams()
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    Json(map)
}

#[derive(Debug, Deserialize)]
pub struct CreateStreamForm {
    pub stream: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub ttl: Option<i64>,
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateStreamResponse {
    pub stream: String,
    pub private: bool,
    pub ttl: u64,
}

pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<CreateStreamForm>,
) -> Result<Json<CreateStreamResponse>, ApiError> {
    if let Some(id) = &form.stream {
        validate_stream_id(id)?;
    }
    let secret = form.secret.filter(|s| !s.is_empty());
    let ttl_secs = form.ttl.filter(|&t| t > 0).map(|t| t as u64);

    let summary = state
        .engine
        .create_stream(form.stream, secret, form.private, ttl_secs)
        .await?;

    Ok(Json(CreateStreamResponse {
        stream: summary.id,
        private: summary.private,
        ttl: summary.ttl_ns as u64 / 1_000_000_000,
    }))
}
