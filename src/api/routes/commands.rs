//! `POST /commands` — post a `command` message and, unless `async=true`,
//! wait briefly for a matching `command_result` to fan back in on the same
//! stream. The engine has no opinion on what a command means; it is just
//! another typed message that some out-of-band consumer is expected to
//! answer by posting a `command_result` with the same `CommandID`.

use std::time::Duration;

use axum::Extension;
use axum::Json;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::server::AppState;
use crate::api::session::SessionToken;
use crate::api::types::{ApiError, validate_stream_id};
use crate::core::constants::{COMMAND_TIMEOUT_SECS, DEFAULT_STREAM_ID};
use crate::engine::{Message, MessageType};
use crate::utils::crypto::generate_token;

#[derive(Debug, Deserialize)]
pub struct PostCommandForm {
    pub stream: Option<String>,
    pub prompt: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(rename = "toLat")]
    pub to_lat: Option<f64>,
    #[serde(rename = "toLon")]
    pub to_lon: Option<f64>,
    #[serde(default)]
    pub r#async: bool,
    pub secret: Option<String>,
}

fn encode_command_text(form: &PostCommandForm) -> String {
    let mut text = form.prompt.clone();
    if let (Some(lat), Some(lon)) = (form.lat, form.lon) {
        text.push_str(&format!(" lat={lat} lon={lon}"));
    }
    if let (Some(lat), Some(lon)) = (form.to_lat, form.to_lon) {
        text.push_str(&format!(" toLat={lat} toLon={lon}"));
    }
    text
}

fn queued(id: String) -> Response {
    Json(serde_json::json!({ "id": id, "status": "queued" })).into_response()
}

pub async fn post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Form(form): Form<PostCommandForm>,
) -> Result<Response, ApiError> {
    let stream = form.stream.clone().unwrap_or_else(|| DEFAULT_STREAM_ID.to_string());
    validate_stream_id(&stream)?;

    if !state.engine.check_secret(&stream, form.secret.as_deref()) {
        return Err(ApiError::Unauthorized("stream secret required".to_string()));
    }

    let command_id = generate_token(8);
    let text = encode_command_text(&form);
    let is_async = form.r#async;

    let mut command = Message::new(generate_token(8), stream.clone(), text, MessageType::Command);
    command.command_id = Some(command_id.clone());

    if is_async {
        state.engine.post(command).await?;
        return Ok(queued(command_id));
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    let observer_id = state.engine.subscribe(stream.clone(), session.0, tx).await?;
    state.engine.post(command).await?;

    let result = tokio::time::timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS), async {
        loop {
            match rx.recv().await {
                Some(msg)
                    if msg.kind == MessageType::CommandResult
                        && msg.command_id.as_deref() == Some(command_id.as_str()) =>
                {
                    return Some(msg.text);
                }
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .ok()
    .flatten();

    state.engine.unsubscribe(stream, observer_id);

    Ok(match result {
        Some(text) => text.into_response(),
        None => queued(command_id),
    })
}
