//! Turns raw chat event payloads into [`ChatMessage`] records.
//!
//! Kick delivers the same logical message in several wire shapes: a JSON
//! string, an object whose `data` field holds JSON text, or a plain object,
//! with the message itself optionally nested under `message`. All of them are
//! collapsed here so nothing downstream ever looks at the shape again.

use crate::models::chat::{ChatMessage, EmoteRef};
use log::debug;
use serde_json::Value;

/// One decoding step of an incoming payload
enum Envelope {
    /// JSON text that has not been decoded yet
    Encoded(String),
    /// Object carrying the real payload as JSON text in `data`
    Wrapped { outer: Value, data: String },
    /// Anything already decoded
    Plain(Value),
}

impl Envelope {
    fn classify(raw: Value) -> Self {
        match raw {
            Value::String(text) => Envelope::Encoded(text),
            outer => match outer.get("data").and_then(Value::as_str) {
                Some(data) => {
                    let data = data.to_string();
                    Envelope::Wrapped { outer, data }
                }
                None => Envelope::Plain(outer),
            },
        }
    }

    /// Decode the outer string (once) and then a `data` string (once).
    /// Parse failures keep the pre-parse value.
    fn open(self) -> Value {
        match self {
            Envelope::Encoded(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::String(inner)) => Value::String(inner),
                Ok(decoded) => Envelope::classify(decoded).open(),
                Err(e) => {
                    debug!("[MessageParser] Payload is not JSON, keeping raw text: {}", e);
                    Value::String(text)
                }
            },
            Envelope::Wrapped { outer, data } => match serde_json::from_str::<Value>(&data) {
                Ok(inner) => inner,
                Err(e) => {
                    debug!("[MessageParser] Nested data is not JSON: {}", e);
                    outer
                }
            },
            Envelope::Plain(value) => value,
        }
    }
}

/// Normalize a payload of unknown shape.
/// Returns `None` when the message body is empty.
pub fn parse_chat_event(raw: &Value) -> Option<ChatMessage> {
    let payload = Envelope::classify(raw.clone()).open();
    let candidate = payload
        .get("message")
        .filter(|m| !m.is_null())
        .unwrap_or(&payload);

    let content = coerce_string(candidate.get("content")).unwrap_or_default();
    if content.is_empty() {
        return None;
    }

    let id = coerce_string(candidate.get("id"))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let username = coerce_string(candidate.pointer("/sender/username"))
        .or_else(|| coerce_string(payload.pointer("/sender/username")))
        .unwrap_or_else(|| "unknown".to_string());

    let created_at = coerce_string(candidate.get("created_at"))
        .or_else(|| coerce_string(payload.get("created_at")))
        .unwrap_or_default();

    Some(ChatMessage {
        id,
        username,
        message: content,
        created_at,
        emotes: parse_emotes(candidate.get("emotes")),
    })
}

fn parse_emotes(value: Option<&Value>) -> Vec<EmoteRef> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<EmoteRef>(item.clone()) {
            Ok(emote) => Some(emote),
            Err(e) => {
                debug!("[MessageParser] Dropping malformed emote {}: {}", item, e);
                None
            }
        })
        .collect()
}

/// Absent and null are "no value"; every other JSON value becomes text
fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inner_message() -> Value {
        json!({
            "id": "msg-1",
            "content": "hello https://kick.com",
            "created_at": "2024-05-01T12:00:00+00:00",
            "sender": { "username": "alice" },
            "emotes": [{ "id": 37226, "name": "KEKW", "start": 0, "end": 4 }]
        })
    }

    #[test]
    fn test_all_shapes_produce_same_message() {
        let plain = inner_message();
        let encoded = Value::String(plain.to_string());
        let wrapped = json!({ "event": "App\\Events\\ChatMessageEvent", "data": plain.to_string() });
        let nested = json!({ "message": plain.clone() });
        let encoded_wrapped = Value::String(wrapped.to_string());

        let expected = parse_chat_event(&plain).unwrap();
        assert_eq!(expected.id, "msg-1");
        assert_eq!(expected.username, "alice");
        assert_eq!(expected.emotes[0].id.as_deref(), Some("37226"));

        for shape in [encoded, wrapped, nested, encoded_wrapped] {
            assert_eq!(parse_chat_event(&shape).unwrap(), expected);
        }
    }

    #[test]
    fn test_empty_content_is_rejected() {
        assert!(parse_chat_event(&json!({ "id": "1", "content": "" })).is_none());
        assert!(parse_chat_event(&json!({ "id": "1" })).is_none());
        assert!(parse_chat_event(&json!({ "id": "1", "content": null })).is_none());
        assert!(parse_chat_event(&json!("not json at all")).is_none());
    }

    #[test]
    fn test_sender_and_timestamp_fall_back_to_outer_payload() {
        let payload = json!({
            "message": { "id": "m", "content": "hi" },
            "sender": { "username": "bob" },
            "created_at": "2024-05-01T12:00:00Z"
        });
        let msg = parse_chat_event(&payload).unwrap();
        assert_eq!(msg.username, "bob");
        assert_eq!(msg.created_at, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let msg = parse_chat_event(&json!({ "content": 42, "emotes": "nope" })).unwrap();
        assert_eq!(msg.message, "42");
        assert_eq!(msg.username, "unknown");
        assert_eq!(msg.created_at, "");
        assert!(msg.emotes.is_empty());
        assert!(!msg.id.is_empty());

        let other = parse_chat_event(&json!({ "content": "x" })).unwrap();
        assert_ne!(msg.id, other.id);
    }

    #[test]
    fn test_malformed_nested_data_keeps_outer_object() {
        let payload = json!({ "data": "{broken", "content": "outer text" });
        let msg = parse_chat_event(&payload).unwrap();
        assert_eq!(msg.message, "outer text");
    }

    #[test]
    fn test_malformed_emotes_are_dropped_individually() {
        let payload = json!({
            "content": "abc",
            "emotes": [
                { "name": "ok", "start": 0, "end": 1 },
                { "name": "bad", "start": "zero", "end": 1 }
            ]
        });
        let msg = parse_chat_event(&payload).unwrap();
        assert_eq!(msg.emotes.len(), 1);
        assert_eq!(msg.emotes[0].name, "ok");
    }
}
