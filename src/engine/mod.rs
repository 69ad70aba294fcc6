//! The in-memory stream engine: data model, bounded stream table, and the
//! single-actor event loop that serializes all mutation.

mod command;
mod engine;
mod error;
mod message;
mod stream;
mod table;

pub use command::{Direction, RetrievalQuery};
pub use engine::{EngineHandle, spawn};
pub use error::EngineError;
pub use message::{Message, MessageType, Metadata, now_ns};
pub use stream::StreamSummary;
