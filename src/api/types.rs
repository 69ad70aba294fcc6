//! Shared API error type, mapped from [`EngineError`] and transport-level
//! failures onto HTTP status codes. Bodies are intentionally terse —
//! `{"error": "..."}` — matching the coarse error reporting this bus uses
//! (see the error taxonomy this is grounded on).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::core::constants::MAX_STREAM_ID_BYTES;
use crate::engine::EngineError;

#[derive(Debug)]
pub enum ApiError {
    /// Missing/oversized/bad-typed request field.
    BadRequest(String),
    /// Stream/message id does not resolve.
    NotFound(String),
    /// Stream secret mismatch.
    Unauthorized(String),
    /// Stream already exists on create. Deliberately reported as a generic
    /// 500 rather than 409, to avoid leaking the existence of private
    /// streams via a distinguishable status code.
    CreateConflict,
    /// Engine queue saturated past WAIT_ENQUEUE.
    Overloaded,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

/// Ingress guard shared by every route that hands a caller-supplied or
/// defaulted stream id to the Engine: empty or oversized ids are rejected
/// before they ever reach `get_or_create`, rather than trusting the cap to
/// `POST /streams` alone.
pub fn validate_stream_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() || id.len() > MAX_STREAM_ID_BYTES {
        return Err(ApiError::bad_request("invalid stream id"));
    }
    Ok(())
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::AlreadyExists => Self::CreateConflict,
            EngineError::MessageNotFound => Self::NotFound(e.to_string()),
            EngineError::EmptyText => Self::BadRequest(e.to_string()),
            EngineError::Overloaded => Self::Overloaded,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::CreateConflict => {
                (StatusCode::INTERNAL_SERVER_ERROR, "cannot create stream".to_string())
            }
            Self::Overloaded => (StatusCode::GATEWAY_TIMEOUT, "engine overloaded".to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
