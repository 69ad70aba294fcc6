//! The single-actor event loop: the sole mutator of stream, observer, and
//! metadata state. Everything else talks to it through [`EngineHandle`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::config::ServerConfig;
use crate::core::constants::{AUTO_STREAM_ID_LEN, ENGINE_QUEUE_DEPTH, WAIT_ENQUEUE_SECS};
use crate::core::shutdown::ShutdownService;
use crate::metadata::MetadataWork;
use crate::utils::crypto::generate_token;

use super::command::{Direction, EngineCommand, ObserverHandle, RetrievalQuery};
use super::error::EngineError;
use super::message::{Message, Metadata, now_ns};
use super::stream::{NewStream, StreamSummary};
use super::table::StreamTable;

/// Handle held by transports and the metadata resolver. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    snapshot: Arc<RwLock<HashMap<String, StreamSummary>>>,
}

impl EngineHandle {
    /// Check a stream secret against the read-side snapshot, without a round
    /// trip through the Engine loop. A stream that doesn't exist yet (about
    /// to be auto-created) has no secret, so it always passes.
    pub fn check_secret(&self, stream: &str, provided: Option<&str>) -> bool {
        match self.snapshot.read().get(stream) {
            None => true,
            Some(s) => s.matches_secret(provided),
        }
    }

    /// Non-private streams, read directly from the snapshot.
    pub fn list_streams(&self) -> Vec<StreamSummary> {
        self.snapshot
            .read()
            .values()
            .filter(|s| !s.private)
            .cloned()
            .collect()
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        tokio::time::timeout(Duration::from_secs(WAIT_ENQUEUE_SECS), self.tx.send(command))
            .await
            .map_err(|_| EngineError::Overloaded)?
            .map_err(|_| EngineError::Overloaded)
    }

    pub async fn post(&self, message: Message) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Post {
            message,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::Overloaded)?
    }

    pub async fn create_stream(
        &self,
        id: Option<String>,
        secret: Option<String>,
        private: bool,
        ttl_secs: Option<u64>,
    ) -> Result<StreamSummary, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::CreateStream {
            id,
            secret,
            private,
            ttl_secs,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::Overloaded)?
    }

    pub async fn subscribe(
        &self,
        stream: String,
        session: String,
        tx: mpsc::Sender<Message>,
    ) -> Result<u64, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Subscribe {
            stream,
            session,
            tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::Overloaded)?
    }

    /// Best-effort; never blocks the caller. Used on connection teardown.
    pub fn unsubscribe(&self, stream: String, observer_id: u64) {
        let _ = self.tx.try_send(EngineCommand::Unsubscribe { stream, observer_id });
    }

    pub async fn get_messages(&self, query: RetrievalQuery) -> Result<Vec<Message>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::GetMessages {
            query,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::Overloaded)?
    }

    /// Feedback path for the metadata resolver; best-effort.
    pub fn attach_metadata(&self, message_id: String, metadata: Metadata) {
        let _ = self
            .tx
            .try_send(EngineCommand::AttachMetadata { message_id, metadata });
    }
}

struct Engine {
    table: StreamTable,
    observers: HashMap<String, Vec<ObserverHandle>>,
    next_observer_id: u64,
    metadata: HashMap<String, (Metadata, i64)>,
    snapshot: Arc<RwLock<HashMap<String, StreamSummary>>>,
    default_ttl: Duration,
    max_message_bytes: usize,
    metadata_tx: mpsc::Sender<MetadataWork>,
}

impl Engine {
    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Post { message, reply } => {
                let result = self.handle_post(message);
                let _ = reply.send(result);
            }
            EngineCommand::CreateStream {
                id,
                secret,
                private,
                ttl_secs,
                reply,
            } => {
                let result = self.handle_create_stream(id, secret, private, ttl_secs);
                let _ = reply.send(result);
            }
            EngineCommand::Subscribe {
                stream,
                session,
                tx,
                reply,
            } => {
                let id = self.handle_subscribe(stream, session, tx);
                let _ = reply.send(Ok(id));
            }
            EngineCommand::Unsubscribe { stream, observer_id } => {
                self.handle_unsubscribe(&stream, observer_id);
            }
            EngineCommand::GetMessages { query, reply } => {
                let result = self.handle_get_messages(&query);
                let _ = reply.send(result);
            }
            EngineCommand::AttachMetadata { message_id, metadata } => {
                self.metadata.insert(message_id, (metadata, now_ns()));
            }
            EngineCommand::Tick => self.handle_tick(),
        }
    }

    fn handle_post(&mut self, mut message: Message) -> Result<(), EngineError> {
        if message.text.is_empty() {
            return Err(EngineError::EmptyText);
        }
        message.text = super::message::truncate_to_bytes(message.text, self.max_message_bytes);
        use super::message::MessageType;
        if message.kind == MessageType::Message {
            let outcome = self
                .table
                .get_or_create(&message.stream, NewStream::auto_created(self.default_ttl));
            if let Some(evicted) = outcome.evicted {
                self.evict_stream_observers(&evicted);
            }
            if let Some(stream) = self.table.get_mut(&message.stream) {
                stream.push(message.clone());
            }
            self.sync_snapshot_for(&message.stream);
            if contains_url(&message.text) {
                let _ = self.metadata_tx.try_send(MetadataWork {
                    message_id: message.id.clone(),
                    text: message.text.clone(),
                });
            }
        }
        self.fan_out(&message);
        Ok(())
    }

    fn handle_create_stream(
        &mut self,
        id: Option<String>,
        secret: Option<String>,
        private: bool,
        ttl_secs: Option<u64>,
    ) -> Result<StreamSummary, EngineError> {
        let (id, auto_generated) = match id {
            Some(s) if !s.is_empty() => (s, false),
            _ => (self.generate_unique_stream_id(), true),
        };
        if !auto_generated && self.table.contains(&id) {
            return Err(EngineError::AlreadyExists);
        }
        let ttl = ttl_secs
            .filter(|&t| t > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        let defaults = NewStream { secret, private, ttl };
        match self.table.create(&id, defaults) {
            Ok(evicted) => {
                if let Some(ev) = evicted {
                    self.evict_stream_observers(&ev);
                }
                self.sync_snapshot_for(&id);
                Ok(StreamSummary::from_stream(self.table.get(&id).unwrap(), 0))
            }
            Err(()) => Err(EngineError::AlreadyExists),
        }
    }

    fn generate_unique_stream_id(&self) -> String {
        loop {
            let candidate = random_alnum(AUTO_STREAM_ID_LEN);
            if !self.table.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn handle_subscribe(&mut self, stream: String, session: String, tx: mpsc::Sender<Message>) -> u64 {
        let outcome = self
            .table
            .get_or_create(&stream, NewStream::auto_created(self.default_ttl));
        if let Some(evicted) = outcome.evicted {
            self.evict_stream_observers(&evicted);
        }
        self.table.touch(&stream);

        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.entry(stream.clone()).or_default().push(ObserverHandle {
            id,
            stream: stream.clone(),
            session,
            tx,
        });
        self.sync_snapshot_for(&stream);

        let connect = Message::synthetic_event(generate_token(8), stream, "connect");
        self.fan_out(&connect);
        id
    }

    fn handle_unsubscribe(&mut self, stream: &str, observer_id: u64) {
        let Some(list) = self.observers.get_mut(stream) else {
            return;
        };
        let before = list.len();
        list.retain(|o| o.id != observer_id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.observers.remove(stream);
        }
        if removed {
            self.table.touch(stream);
            self.sync_snapshot_for(stream);
            let close = Message::synthetic_event(generate_token(8), stream.to_string(), "close");
            self.fan_out(&close);
        }
    }

    fn handle_get_messages(&self, query: &RetrievalQuery) -> Result<Vec<Message>, EngineError> {
        let Some(stream) = self.table.get(&query.stream) else {
            return Ok(Vec::new());
        };

        if let Some(message_id) = &query.message_id {
            return stream
                .messages
                .iter()
                .find(|m| &m.id == message_id)
                .filter(|m| m.visible_to(&query.session))
                .cloned()
                .map(|m| vec![self.overlay_metadata(m)])
                .ok_or(EngineError::MessageNotFound);
        }

        let matched: Vec<&Message> = match query.direction {
            Direction::Forward => stream
                .messages
                .iter()
                .filter(|m| m.created > query.cursor)
                .collect(),
            Direction::Backward => stream
                .messages
                .iter()
                .rev()
                .filter(|m| m.created < query.cursor)
                .collect(),
        };

        Ok(matched
            .into_iter()
            .filter(|m| m.visible_to(&query.session))
            .take(query.limit)
            .cloned()
            .map(|m| self.overlay_metadata(m))
            .collect())
    }

    fn overlay_metadata(&self, mut message: Message) -> Message {
        if let Some((metadata, _)) = self.metadata.get(&message.id) {
            message.metadata = Some(metadata.clone());
        }
        message
    }

    fn handle_tick(&mut self) {
        let now = now_ns();
        let ttl_ns = self.default_ttl.as_nanos() as i64;
        self.metadata.retain(|_, (_, stored_at)| now - *stored_at <= ttl_ns);

        let expired = self.table.expired_ids(now);
        for id in &expired {
            self.table.delete(id);
            self.evict_stream_observers(id);
        }

        let ids: Vec<String> = self.table.ids().cloned().collect();
        for id in ids {
            if let Some(stream) = self.table.get_mut(&id) {
                stream.age_out(now);
            }
        }
    }

    fn fan_out(&mut self, message: &Message) {
        let Some(list) = self.observers.get_mut(&message.stream) else {
            return;
        };
        list.retain(|observer| {
            if !message.visible_to(&observer.session) {
                return true;
            }
            // A full queue means the observer is behind, not gone: drop this
            // message for them and keep the subscription. Only a closed
            // receiver (the connection is gone) removes the observer.
            match observer.tx.try_send(message.clone()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        if list.is_empty() {
            self.observers.remove(&message.stream);
        }
    }

    fn evict_stream_observers(&mut self, id: &str) {
        if let Some(observers) = self.observers.remove(id) {
            let close = Message::synthetic_event(generate_token(8), id.to_string(), "close");
            for observer in observers {
                let _ = observer.tx.try_send(close.clone());
            }
        }
        self.snapshot.write().remove(id);
    }

    fn sync_snapshot_for(&mut self, id: &str) {
        if let Some(stream) = self.table.get(id) {
            let count = self.observers.get(id).map(Vec::len).unwrap_or(0);
            self.snapshot
                .write()
                .insert(id.to_string(), StreamSummary::from_stream(stream, count));
        }
    }
}

fn random_alnum(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// Very loose URL-shaped token detection: the first whitespace-delimited
/// token that starts with an http(s) scheme.
fn contains_url(text: &str) -> bool {
    text.split_whitespace()
        .any(|tok| tok.starts_with("http://") || tok.starts_with("https://"))
}

/// Spawn the Engine loop and its Tick-generating reaper, registering both
/// with `shutdown` so graceful shutdown waits for them to exit.
pub async fn spawn(
    config: &ServerConfig,
    metadata_tx: mpsc::Sender<MetadataWork>,
    shutdown: &ShutdownService,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel(ENGINE_QUEUE_DEPTH);
    let snapshot = Arc::new(RwLock::new(HashMap::new()));

    let mut engine = Engine {
        table: StreamTable::new(config.max_streams, config.max_messages_per_stream),
        observers: HashMap::new(),
        next_observer_id: 0,
        metadata: HashMap::new(),
        snapshot: snapshot.clone(),
        default_ttl: config.stream_ttl,
        max_message_bytes: config.max_message_bytes,
        metadata_tx,
    };

    let mut shutdown_rx = shutdown.subscribe();
    let loop_handle: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => engine.handle(cmd),
                        None => break,
                    }
                }
            }
        }
    });
    shutdown.register(loop_handle).await;

    let reaper_tx = tx.clone();
    let interval = config.reaper_interval;
    let mut reaper_shutdown_rx = shutdown.subscribe();
    let reaper_handle: JoinHandle<()> = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = reaper_shutdown_rx.changed() => {
                    if *reaper_shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if reaper_tx.send(EngineCommand::Tick).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    shutdown.register(reaper_handle).await;

    EngineHandle { tx, snapshot }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cli::CliConfig;
    use crate::engine::message::MessageType;
    use crate::metadata;

    async fn test_handle(max_streams: usize, max_messages: usize) -> EngineHandle {
        let mut config = ServerConfig::from_cli(CliConfig::default());
        config.max_streams = max_streams;
        config.max_messages_per_stream = max_messages;
        config.reaper_interval = Duration::from_millis(20);
        let shutdown = ShutdownService::new();
        let (metadata_tx, _metadata_rx) = metadata::work_channel();
        spawn(&config, metadata_tx, &shutdown).await
    }

    #[tokio::test]
    async fn post_creates_stream_and_stores_message() {
        let engine = test_handle(10, 10).await;
        let msg = Message::new("1".into(), "s1", "hello".into(), MessageType::Message);
        engine.post(msg).await.unwrap();

        let result = engine
            .get_messages(RetrievalQuery {
                stream: "s1".into(),
                session: "anon".into(),
                message_id: None,
                cursor: 0,
                direction: Direction::Forward,
                limit: 25,
            })
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "hello");
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let engine = test_handle(10, 10).await;
        let msg = Message::new("1".into(), "s1", String::new(), MessageType::Message);
        let err = engine.post(msg).await.unwrap_err();
        assert_eq!(err, EngineError::EmptyText);
    }

    #[tokio::test]
    async fn channel_visibility_is_enforced() {
        let engine = test_handle(10, 10).await;
        let mut msg = Message::new("1".into(), "s1", "psst".into(), MessageType::Message);
        msg.channel = "@alice".into();
        engine.post(msg).await.unwrap();

        let as_alice = engine
            .get_messages(RetrievalQuery {
                stream: "s1".into(),
                session: "alice".into(),
                message_id: None,
                cursor: 0,
                direction: Direction::Forward,
                limit: 25,
            })
            .await
            .unwrap();
        assert_eq!(as_alice.len(), 1);

        let as_bob = engine
            .get_messages(RetrievalQuery {
                stream: "s1".into(),
                session: "bob".into(),
                message_id: None,
                cursor: 0,
                direction: Direction::Forward,
                limit: 25,
            })
            .await
            .unwrap();
        assert!(as_bob.is_empty());
    }

    #[tokio::test]
    async fn subscribe_receives_connect_then_post() {
        let engine = test_handle(10, 10).await;
        let (tx, mut rx) = mpsc::channel(1);
        engine.subscribe("s1".into(), "anon".into(), tx).await.unwrap();

        let connect = rx.recv().await.unwrap();
        assert_eq!(connect.text, "connect");

        let msg = Message::new("1".into(), "s1", "hi".into(), MessageType::Message);
        engine.post(msg).await.unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.text, "hi");
    }

    #[tokio::test]
    async fn lru_eviction_closes_observers() {
        let engine = test_handle(1, 10).await;
        let (tx, mut rx) = mpsc::channel(4);
        engine.subscribe("a".into(), "anon".into(), tx).await.unwrap();
        let _ = rx.recv().await.unwrap(); // connect

        let (tx2, _rx2) = mpsc::channel(4);
        engine.subscribe("b".into(), "anon".into(), tx2).await.unwrap();

        let closed = rx.recv().await.unwrap();
        assert_eq!(closed.text, "close");
    }

    #[tokio::test]
    async fn secret_gates_check_secret() {
        let engine = test_handle(10, 10).await;
        engine
            .create_stream(Some("locked".into()), Some("hunter2".into()), false, None)
            .await
            .unwrap();
        assert!(!engine.check_secret("locked", None));
        assert!(!engine.check_secret("locked", Some("wrong")));
        assert!(engine.check_secret("locked", Some("hunter2")));
        assert!(engine.check_secret("unknown-stream", None));
    }

    #[tokio::test]
    async fn create_stream_collision_errors() {
        let engine = test_handle(10, 10).await;
        engine.create_stream(Some("dup".into()), None, false, None).await.unwrap();
        let err = engine
            .create_stream(Some("dup".into()), None, false, None)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::AlreadyExists);
    }

    #[tokio::test]
    async fn ring_buffer_trims_to_capacity() {
        let engine = test_handle(10, 3).await;
        for i in 0..5 {
            let msg = Message::new(i.to_string(), "s", i.to_string(), MessageType::Message);
            engine.post(msg).await.unwrap();
        }
        let result = engine
            .get_messages(RetrievalQuery {
                stream: "s".into(),
                session: "anon".into(),
                message_id: None,
                cursor: 0,
                direction: Direction::Forward,
                limit: 100,
            })
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].id, "2");
        assert_eq!(result[2].id, "4");
    }

    #[tokio::test]
    async fn reaper_evicts_idle_stream_and_closes_observers() {
        let mut config = ServerConfig::from_cli(CliConfig::default());
        config.max_streams = 10;
        config.max_messages_per_stream = 10;
        config.stream_ttl = Duration::from_millis(30);
        config.reaper_interval = Duration::from_millis(10);
        let shutdown = ShutdownService::new();
        let (metadata_tx, _metadata_rx) = metadata::work_channel();
        let engine = spawn(&config, metadata_tx, &shutdown).await;

        engine
            .create_stream(Some("s1".into()), None, false, None)
            .await
            .unwrap();
        assert_eq!(engine.list_streams().len(), 1);

        let (tx, mut rx) = mpsc::channel(4);
        engine.subscribe("s1".into(), "anon".into(), tx).await.unwrap();
        let _ = rx.recv().await.unwrap(); // connect

        let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("reaper should evict the idle stream before the timeout")
            .unwrap();
        assert_eq!(closed.text, "close");
        assert!(engine.list_streams().is_empty());
    }
}
