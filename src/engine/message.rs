//! Wire-shaped message and link-preview metadata types.

use serde::{Deserialize, Serialize};

/// Kind of a message flowing through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Message,
    Event,
    Command,
    CommandResult,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Message
    }
}

/// Link-preview metadata, attached asynchronously after a message is posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "Created")]
    pub created: i64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Site")]
    pub site: String,
}

fn serialize_ns_as_string<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_string())
}

fn deserialize_ns_from_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<i64>().map_err(serde::de::Error::custom)
}

/// An immutable record posted to, or synthesised on, a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Type")]
    pub kind: MessageType,
    #[serde(
        rename = "Created",
        serialize_with = "serialize_ns_as_string",
        deserialize_with = "deserialize_ns_from_string"
    )]
    pub created: i64,
    #[serde(rename = "Stream")]
    pub stream: String,
    #[serde(rename = "Channel", default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(rename = "CommandID", default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(rename = "Metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Current wall-clock time in nanoseconds since the epoch.
pub fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

impl Message {
    /// Text is stored as given; the Engine truncates to the configured
    /// `max_message_bytes` on ingestion (`Engine::handle_post`), so the cap
    /// tracks `ServerConfig` rather than a value baked in at construction.
    pub fn new(id: String, stream: impl Into<String>, text: String, kind: MessageType) -> Self {
        Self {
            id,
            text,
            kind,
            created: now_ns(),
            stream: stream.into(),
            channel: String::new(),
            command_id: None,
            metadata: None,
        }
    }

    /// Synthesise a `connect`/`close` event for a stream.
    pub fn synthetic_event(id: String, stream: impl Into<String>, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            kind: MessageType::Event,
            created: now_ns(),
            stream: stream.into(),
            channel: String::new(),
            command_id: None,
            metadata: None,
        }
    }

    /// True if this message is addressed to a single session (`@<session>`)
    /// rather than broadcast to the whole stream (empty channel).
    pub fn visible_to(&self, session: &str) -> bool {
        self.channel.is_empty() || self.channel == format!("@{session}")
    }
}

/// Truncate UTF-8 text to at most `max_bytes`, respecting char boundaries.
pub fn truncate_to_bytes(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_noop_when_short() {
        assert_eq!(truncate_to_bytes("hi".to_string(), 512), "hi");
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "é".repeat(10); // each 'é' is 2 bytes
        let truncated = truncate_to_bytes(s, 5);
        assert!(truncated.len() <= 5);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn visible_to_empty_channel_is_public() {
        let m = Message::new("1".into(), "s", "hi".into(), MessageType::Message);
        assert!(m.visible_to("anyone"));
    }

    #[test]
    fn visible_to_matches_addressed_session() {
        let mut m = Message::new("1".into(), "s", "hi".into(), MessageType::Message);
        m.channel = "@alice".to_string();
        assert!(m.visible_to("alice"));
        assert!(!m.visible_to("bob"));
    }

    #[test]
    fn message_json_schema_round_trip() {
        let m = Message::new("abc".into(), "s1", "hello".into(), MessageType::Message);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["Id"], "abc");
        assert_eq!(json["Stream"], "s1");
        assert!(json["Created"].is_string());
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn message_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&MessageType::CommandResult).unwrap(),
            "\"command_result\""
        );
    }
}
