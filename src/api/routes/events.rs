//! `GET /events` — live subscription, dispatched to WebSocket or SSE
//! depending on whether the request carries upgrade headers.

use std::time::Duration;

use axum::Extension;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::SEC_WEBSOCKET_PROTOCOL;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::api::server::AppState;
use crate::api::session::SessionToken;
use crate::api::types::{ApiError, validate_stream_id};
use crate::core::constants::{DEFAULT_STREAM_ID, OBSERVER_QUEUE, WS_PING_PERIOD_SECS, WS_PONG_WAIT_SECS};
use crate::engine::{EngineHandle, Message};

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub stream: Option<String>,
    pub secret: Option<String>,
}

pub async fn handle(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    let stream = query.stream.unwrap_or_else(|| DEFAULT_STREAM_ID.to_string());
    validate_stream_id(&stream)?;

    if !state.engine.check_secret(&stream, query.secret.as_deref()) {
        return Err(ApiError::Unauthorized("stream secret required".to_string()));
    }

    match ws {
        Some(upgrade) => {
            // Clients smuggle auth in the subprotocol list; echo it back
            // verbatim rather than negotiating against a known set.
            let requested_protocol = headers.get(SEC_WEBSOCKET_PROTOCOL).cloned();
            let engine = state.engine.clone();
            let max_bytes = state.config.max_message_bytes;
            let mut response = upgrade
                .max_message_size(max_bytes)
                .max_frame_size(max_bytes)
                .on_upgrade(move |socket| handle_websocket(socket, engine, stream, session.0))
                .into_response();
            if let Some(protocol) = requested_protocol {
                response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
            }
            Ok(response)
        }
        None => Ok(handle_sse(state.engine, stream, session.0).await.into_response()),
    }
}

async fn subscribe(engine: &EngineHandle, stream: String, session: String) -> (u64, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(OBSERVER_QUEUE);
    let id = engine
        .subscribe(stream, session, tx)
        .await
        .unwrap_or_default();
    (id, rx)
}

async fn handle_sse(
    engine: EngineHandle,
    stream: String,
    session: String,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (observer_id, mut rx) = subscribe(&engine, stream.clone(), session).await;

    let out = async_stream::stream! {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(data) => yield Ok(Event::default().data(data)),
                Err(e) => tracing::error!(error = %e, "failed to serialize SSE event"),
            }
        }
        engine.unsubscribe(stream, observer_id);
    };

    Sse::new(out).keep_alive(KeepAlive::new().interval(Duration::from_secs(WS_PING_PERIOD_SECS)).text("keep-alive"))
}

async fn handle_websocket(socket: WebSocket, engine: EngineHandle, stream: String, session: String) {
    let (observer_id, mut rx) = subscribe(&engine, stream.clone(), session).await;
    let (mut sink, mut source) = socket.split();

    let mut ping_interval = tokio::time::interval(Duration::from_secs(WS_PING_PERIOD_SECS));
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            biased;
            incoming = source.next() => {
                match incoming {
                    Some(Ok(WsMessage::Pong(_))) => last_pong = tokio::time::Instant::now(),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Inbound frames are otherwise ignored by the engine.
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > Duration::from_secs(WS_PONG_WAIT_SECS) {
                    break;
                }
                if sink.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        let Ok(text) = serde_json::to_string(&msg) else { continue };
                        if sink.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    engine.unsubscribe(stream, observer_id);
}
