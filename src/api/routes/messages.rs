//! `GET/POST /messages` — history retrieval and posting.

use axum::Extension;
use axum::Json;
use axum::extract::{Form, Query, State};
use serde::Deserialize;

use crate::api::server::AppState;
use crate::api::session::SessionToken;
use crate::api::types::{ApiError, validate_stream_id};
use crate::core::constants::{DEFAULT_MESSAGE_LIMIT, DEFAULT_STREAM_ID};
use crate::engine::{Direction, Message, MessageType, RetrievalQuery, now_ns};

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    pub stream: Option<String>,
    pub id: Option<String>,
    pub last: Option<i64>,
    pub limit: Option<usize>,
    pub direction: Option<i8>,
    pub secret: Option<String>,
}

pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let stream = query.stream.unwrap_or_else(|| DEFAULT_STREAM_ID.to_string());
    validate_stream_id(&stream)?;

    if !state.engine.check_secret(&stream, query.secret.as_deref()) {
        return Err(ApiError::Unauthorized("stream secret required".to_string()));
    }

    let direction = match query.direction {
        Some(d) if d < 0 => Direction::Backward,
        _ => Direction::Forward,
    };

    let messages = state
        .engine
        .get_messages(RetrievalQuery {
            stream,
            session: session.0,
            message_id: query.id,
            cursor: query.last.unwrap_or(0),
            direction,
            limit: query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT),
        })
        .await?;

    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct PostMessageForm {
    pub stream: Option<String>,
    pub message: Option<String>,
    pub text: Option<String>,
    pub secret: Option<String>,
    /// Visibility tag: empty (default) is public, `@<session>` addresses a
    /// single observer, `#<group>` is reserved for shared subsets.
    pub channel: Option<String>,
}

pub async fn post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Form(form): Form<PostMessageForm>,
) -> Result<(), ApiError> {
    let stream = form.stream.unwrap_or_else(|| DEFAULT_STREAM_ID.to_string());
    validate_stream_id(&stream)?;
    let text = form
        .message
        .or(form.text)
        .ok_or_else(|| ApiError::bad_request("missing 'message' field"))?;

    if !state.engine.check_secret(&stream, form.secret.as_deref()) {
        return Err(ApiError::Unauthorized("stream secret required".to_string()));
    }

    let mut message = Message::new(new_message_id(&session.0), stream, text, MessageType::Message);
    if let Some(channel) = form.channel.filter(|c| !c.is_empty()) {
        message.channel = channel;
    }
    state.engine.post(message).await?;
    Ok(())
}

fn new_message_id(session: &str) -> String {
    format!("{session}-{}", now_ns())
}
