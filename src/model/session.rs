//! Sessions and messages.

use std::borrow::Cow;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UnknownFields;

/// A parsed archive: the chat store plus any sibling top-level keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// The chat store holding the session list.
    pub store: Store,
    /// Whether the store was nested under [`super::STORE_KEY`] in the source.
    pub nested: bool,
    /// Top-level keys other than the store (app config, masks, ...).
    pub extra: UnknownFields,
}

impl Archive {
    /// Sessions in export order.
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.store.sessions
    }

    /// Total number of messages across all sessions.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.store.sessions.iter().map(Session::message_count).sum()
    }
}

/// The chat store: an ordered session collection plus opaque store state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Sessions in export order.
    pub sessions: Vec<Session>,
    /// Other store keys (`currentSessionIndex`, ...).
    #[serde(flatten)]
    pub extra: UnknownFields,
}

/// One conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque session identifier. Numeric IDs are normalized to strings.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "nullable_string")]
    pub topic: String,
    /// Summarized context the client carries between turns.
    #[serde(default, deserialize_with = "nullable_string")]
    pub memory_prompt: String,
    /// Messages in conversation order.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub messages: Vec<Message>,
    /// Model config, timestamps, statistics and anything else.
    #[serde(flatten)]
    pub extra: UnknownFields,
}

impl Session {
    /// Number of messages in this session.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Model name recorded in the session's mask, if any.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.extra
            .get("mask")
            .and_then(|mask| mask.get("modelConfig"))
            .and_then(|config| config.get("model"))
            .and_then(Value::as_str)
    }

    /// Last update marker exactly as exported (usually epoch milliseconds).
    #[must_use]
    pub fn last_update(&self) -> Option<String> {
        self.extra.get("lastUpdate").and_then(scalar_text)
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role ("user", "assistant", "system", ...).
    pub role: String,
    /// Message body.
    pub content: MessageContent,
    /// Message id, date, streaming flags and other opaque fields.
    #[serde(flatten)]
    pub extra: UnknownFields,
}

impl Message {
    /// Create a plain-text message.
    #[must_use]
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
            extra: UnknownFields::new(),
        }
    }

    /// The content rendered as text.
    #[must_use]
    pub fn content_text(&self) -> Cow<'_, str> {
        self.content.as_text()
    }
}

/// Message body: plain text, or structured data (e.g. multimodal parts).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Any non-string JSON value, kept as-is.
    Structured(Value),
}

impl MessageContent {
    /// Text form: the string itself, or compact JSON for structured content.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Structured(value) => Cow::Owned(value.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Self::Text(text),
            Value::Null => Self::Text(String::new()),
            other => Self::Structured(other),
        })
    }
}

/// Render a scalar JSON value as text; `None` for null, arrays and objects.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "session id must be a string or number, found {}",
            json_type_name(&other)
        ))),
    }
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// JSON type name for diagnostics.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
