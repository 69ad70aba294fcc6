//! Engine-level error taxonomy. Transports map these onto HTTP status codes.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("stream already exists")]
    AlreadyExists,
    #[error("message not found")]
    MessageNotFound,
    #[error("message text must not be empty")]
    EmptyText,
    #[error("engine overloaded")]
    Overloaded,
}
