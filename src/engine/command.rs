//! Commands enqueued into the Engine's single inbound channel, and the
//! Observer handle transports hold for outbound fan-out.

use tokio::sync::{mpsc, oneshot};

use super::error::EngineError;
use super::message::{Message, Metadata};
use super::stream::StreamSummary;

/// A live subscription. Cloning is cheap; the `tx` end is the only thing a
/// transport needs to receive fanned-out messages. `session` gates
/// channel-addressed delivery.
#[derive(Debug)]
pub struct ObserverHandle {
    pub id: u64,
    pub stream: String,
    pub session: String,
    pub tx: mpsc::Sender<Message>,
}

/// Cursor direction for history retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub stream: String,
    pub session: String,
    pub message_id: Option<String>,
    pub cursor: i64,
    pub direction: Direction,
    pub limit: usize,
}

pub enum EngineCommand {
    Post {
        message: Message,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    CreateStream {
        id: Option<String>,
        secret: Option<String>,
        private: bool,
        ttl_secs: Option<u64>,
        reply: oneshot::Sender<Result<StreamSummary, EngineError>>,
    },
    Subscribe {
        stream: String,
        session: String,
        tx: mpsc::Sender<Message>,
        reply: oneshot::Sender<Result<u64, EngineError>>,
    },
    Unsubscribe {
        stream: String,
        observer_id: u64,
    },
    GetMessages {
        query: RetrievalQuery,
        reply: oneshot::Sender<Result<Vec<Message>, EngineError>>,
    },
    AttachMetadata {
        message_id: String,
        metadata: Metadata,
    },
    Tick,
}
