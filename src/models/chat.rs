use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Positional emote reference inside a message.
/// `start` and `end` are inclusive char offsets into the message text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EmoteRef {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub start: usize,
    pub end: usize,
}

// Emote ids arrive as strings or as bare numbers depending on the event source
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A parsed segment of a chat message, ready for rendering
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageSegment {
    Text {
        content: String,
    },
    Emote {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emote_id: Option<String>,
        /// `None` when neither a source nor an id was available;
        /// the emote is then rendered as its name.
        #[serde(skip_serializing_if = "Option::is_none")]
        emote_url: Option<String>,
    },
}

impl MessageSegment {
    pub fn text(content: impl Into<String>) -> Self {
        MessageSegment::Text {
            content: content.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub message: String,
    /// ISO-8601 timestamp from the upstream event, or empty
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub emotes: Vec<EmoteRef>,
}
