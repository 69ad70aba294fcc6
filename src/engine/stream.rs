//! A single stream: a bounded, ordered buffer of messages plus housekeeping.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

use super::message::{Message, now_ns};

/// Parameters used when a stream is created (explicitly or implicitly).
#[derive(Debug, Clone)]
pub struct NewStream {
    pub secret: Option<String>,
    pub private: bool,
    pub ttl: Duration,
}

impl NewStream {
    /// Defaults for a stream that springs into existence from a first
    /// `POST /messages`/`/commands`/`/events` rather than an explicit
    /// `POST /streams` — private, so an unexpected stream id never shows up
    /// in `GET /streams` for anyone who didn't already know its name.
    pub fn auto_created(default_ttl: Duration) -> Self {
        Self {
            secret: None,
            private: true,
            ttl: default_ttl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stream {
    pub id: String,
    pub secret: Option<String>,
    pub private: bool,
    pub messages: VecDeque<Message>,
    pub updated: i64,
    pub ttl: Duration,
    max_messages: usize,
}

impl Stream {
    pub fn new(id: String, defaults: NewStream, max_messages: usize) -> Self {
        Self {
            id,
            secret: defaults.secret,
            private: defaults.private,
            messages: VecDeque::new(),
            updated: now_ns(),
            ttl: defaults.ttl,
            max_messages,
        }
    }

    /// Append a message, trimming the oldest entries past `max_messages`.
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        self.updated = now_ns();
    }

    /// Drop messages older than `self.ttl` relative to `now`.
    pub fn age_out(&mut self, now: i64) {
        let ttl_ns = self.ttl.as_nanos() as i64;
        self.messages.retain(|m| now - m.created <= ttl_ns);
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now - self.updated > self.ttl.as_nanos() as i64
    }
}

/// Constant-time secret check shared with [`StreamSummary`]: an unset secret
/// admits anyone, a set one requires an exact match.
fn secret_matches(secret: &Option<String>, provided: Option<&str>) -> bool {
    match secret {
        None => true,
        Some(expected) => provided
            .map(|p| crate::utils::crypto::constant_time_eq(p, expected))
            .unwrap_or(false),
    }
}

/// Lightweight, cloneable view of a stream's public fields, for listing and
/// for the secret-check snapshot transports read without an Engine round-trip.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Updated")]
    pub updated: i64,
    #[serde(rename = "TTL")]
    pub ttl_ns: i64,
    #[serde(rename = "Observers")]
    pub observers: usize,
    #[serde(skip)]
    pub private: bool,
    #[serde(skip)]
    pub secret: Option<String>,
}

impl StreamSummary {
    pub fn from_stream(s: &Stream, observers: usize) -> Self {
        Self {
            id: s.id.clone(),
            updated: s.updated,
            ttl_ns: s.ttl.as_nanos() as i64,
            observers,
            private: s.private,
            secret: s.secret.clone(),
        }
    }

    pub fn matches_secret(&self, provided: Option<&str>) -> bool {
        secret_matches(&self.secret, provided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::message::MessageType;

    fn msg(id: &str, stream: &str) -> Message {
        Message::new(id.into(), stream, "hi".into(), MessageType::Message)
    }

    #[test]
    fn push_trims_ring_buffer() {
        let mut s = Stream::new("s".into(), NewStream::auto_created(Duration::from_secs(60)), 3);
        for i in 0..5 {
            s.push(msg(&i.to_string(), "s"));
        }
        assert_eq!(s.messages.len(), 3);
        assert_eq!(s.messages.front().unwrap().id, "2");
        assert_eq!(s.messages.back().unwrap().id, "4");
    }

    #[test]
    fn age_out_drops_old_messages() {
        let mut s = Stream::new(
            "s".into(),
            NewStream {
                secret: None,
                private: false,
                ttl: Duration::from_secs(10),
            },
            100,
        );
        let mut old = msg("old", "s");
        old.created = now_ns() - Duration::from_secs(20).as_nanos() as i64;
        s.messages.push_back(old);
        s.messages.push_back(msg("new", "s"));
        s.age_out(now_ns());
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].id, "new");
    }

    #[test]
    fn matches_secret_open_stream_accepts_anything() {
        let s = Stream::new("s".into(), NewStream::auto_created(Duration::from_secs(1)), 10);
        let summary = StreamSummary::from_stream(&s, 0);
        assert!(summary.matches_secret(None));
        assert!(summary.matches_secret(Some("whatever")));
    }

    #[test]
    fn matches_secret_requires_exact_match() {
        let s = Stream::new(
            "s".into(),
            NewStream {
                secret: Some("hunter2".into()),
                private: false,
                ttl: Duration::from_secs(1),
            },
            10,
        );
        let summary = StreamSummary::from_stream(&s, 0);
        assert!(!summary.matches_secret(None));
        assert!(!summary.matches_secret(Some("wrong")));
        assert!(summary.matches_secret(Some("hunter2")));
    }
}
