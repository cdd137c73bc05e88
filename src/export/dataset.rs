//! JSON dataset export.
//!
//! Flattens sessions into a JSON array suitable for ML tooling. Field order
//! is fixed by the record structs below.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::model::{Message, MessageContent, Session};

use super::check_canceled;

/// One record per message, or one per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetGranularity {
    /// `{session_id, title, message_index, role, content}` per message.
    #[default]
    Message,
    /// `{session_id, title, messages: [{role, content}]}` per session.
    Session,
}

/// A message reduced to role and content.
#[derive(Debug, Serialize)]
pub(crate) struct MessageEntry<'a> {
    role: &'a str,
    content: &'a MessageContent,
}

impl<'a> From<&'a Message> for MessageEntry<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: &message.role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageRecord<'a> {
    session_id: &'a str,
    title: &'a str,
    message_index: usize,
    role: &'a str,
    content: &'a MessageContent,
}

#[derive(Debug, Serialize)]
struct SessionRecord<'a> {
    session_id: &'a str,
    title: &'a str,
    messages: Vec<MessageEntry<'a>>,
}

/// Dataset extractor.
#[derive(Debug, Clone, Default)]
pub struct DatasetExtractor {
    /// Pretty-print the JSON output.
    pretty: bool,
    granularity: DatasetGranularity,
}

impl DatasetExtractor {
    /// Create a compact, per-message extractor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty-printing.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set record granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: DatasetGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Render `sessions` as a JSON array terminated by a newline.
    pub fn extract(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = match self.granularity {
            DatasetGranularity::Message => {
                let mut records = Vec::new();
                for session in sessions {
                    check_canceled(cancel)?;
                    records.extend(session.messages.iter().enumerate().map(|(index, message)| {
                        MessageRecord {
                            session_id: &session.id,
                            title: &session.topic,
                            message_index: index,
                            role: &message.role,
                            content: &message.content,
                        }
                    }));
                }
                debug!(records = records.len(), "Dataset rendered");
                self.serialize(&records)?
            }
            DatasetGranularity::Session => {
                let mut records = Vec::with_capacity(sessions.len());
                for session in sessions {
                    check_canceled(cancel)?;
                    records.push(SessionRecord {
                        session_id: &session.id,
                        title: &session.topic,
                        messages: session.messages.iter().map(MessageEntry::from).collect(),
                    });
                }
                debug!(records = records.len(), "Dataset rendered");
                self.serialize(&records)?
            }
        };
        out.push(b'\n');
        Ok(out)
    }

    fn serialize<T: Serialize>(&self, records: &[T]) -> Result<Vec<u8>> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(records)
        } else {
            serde_json::to_vec(records)
        };
        result.map_err(|e| ExporterError::SerializationError {
            context: "dataset records".to_string(),
            source: e,
        })
    }
}
