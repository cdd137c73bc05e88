//! CSV export for session archives.
//!
//! One formatter, four layouts. Rows follow session order, and message rows
//! follow message order within a session. Fields are quoted RFC-4180 style
//! whenever they contain the delimiter, the quote character or any control
//! character.

use std::borrow::Cow;
use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::model::Session;

use super::dataset::MessageEntry;
use super::{check_canceled, CsvLayout, LineEnding};

const INLINE_HEADER: [&str; 4] = ["session_id", "title", "memory_prompt", "messages"];
const PER_LINE_HEADER: [&str; 5] = ["session_id", "title", "role", "message_index", "content"];
const SESSIONS_HEADER: [&str; 6] = [
    "session_id",
    "title",
    "memory_prompt",
    "model",
    "last_update",
    "message_count",
];
const MESSAGES_HEADER: [&str; 4] = ["session_id", "role", "message_index", "content"];

/// Rendered CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvOutput {
    /// Layouts that produce one stream.
    Single(Vec<u8>),
    /// The separate-files layout.
    Separate {
        /// Sessions stream.
        sessions: Vec<u8>,
        /// Messages stream, linked to sessions by `session_id`.
        messages: Vec<u8>,
    },
}

impl CsvOutput {
    /// Number of streams (1 or 2).
    #[must_use]
    pub const fn stream_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Separate { .. } => 2,
        }
    }
}

/// Reject delimiters that collide with quoting or record terminators.
pub fn check_delimiter(delimiter: char) -> Result<()> {
    if matches!(delimiter, '"' | '\r' | '\n') {
        return Err(ExporterError::selection("CSV delimiter", format!("{delimiter:?}")));
    }
    Ok(())
}

/// CSV formatter for session data.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    /// Row layout.
    layout: CsvLayout,
    /// Include header row.
    include_header: bool,
    /// Field delimiter.
    delimiter: char,
    /// Quote character.
    quote_char: char,
    /// Record terminator.
    line_ending: LineEnding,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new(CsvLayout::default())
    }
}

impl CsvFormatter {
    /// Create a formatter for `layout` with comma delimiter and header row.
    #[must_use]
    pub fn new(layout: CsvLayout) -> Self {
        Self {
            layout,
            include_header: true,
            delimiter: ',',
            quote_char: '"',
            line_ending: LineEnding::platform(),
        }
    }

    /// Include or exclude header row.
    #[must_use]
    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delim: char) -> Self {
        self.delimiter = delim;
        self
    }

    /// Set the record terminator.
    #[must_use]
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// The configured layout.
    #[must_use]
    pub const fn layout(&self) -> CsvLayout {
        self.layout
    }

    /// Render `sessions`. Checks `cancel` before every session and message.
    pub fn format(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<CsvOutput> {
        check_delimiter(self.delimiter)?;
        let output = match self.layout {
            CsvLayout::Inline => CsvOutput::Single(self.render_inline(sessions, cancel)?),
            CsvLayout::PerLine => CsvOutput::Single(self.render_per_line(sessions, cancel)?),
            CsvLayout::JsonInCsv => CsvOutput::Single(self.render_json_in_csv(sessions, cancel)?),
            CsvLayout::SeparateFiles => CsvOutput::Separate {
                sessions: self.render_sessions_table(sessions, cancel)?,
                messages: self.render_messages_table(sessions, cancel)?,
            },
        };
        debug!(layout = %self.layout, sessions = sessions.len(), "CSV rendered");
        Ok(output)
    }

    fn render_inline(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.include_header {
            self.write_row(&mut out, &INLINE_HEADER)?;
        }

        for session in sessions {
            check_canceled(cancel)?;
            let mut lines = Vec::with_capacity(session.messages.len());
            for message in &session.messages {
                check_canceled(cancel)?;
                lines.push(format!("{}: {}", message.role, message.content_text()));
            }
            self.write_row(
                &mut out,
                &[&session.id, &session.topic, &session.memory_prompt, &lines.join("\n")],
            )?;
        }

        Ok(out)
    }

    fn render_per_line(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.include_header {
            self.write_row(&mut out, &PER_LINE_HEADER)?;
        }

        for session in sessions {
            check_canceled(cancel)?;
            for (index, message) in session.messages.iter().enumerate() {
                check_canceled(cancel)?;
                self.write_row(
                    &mut out,
                    &[
                        &session.id,
                        &session.topic,
                        &message.role,
                        &index.to_string(),
                        &message.content_text(),
                    ],
                )?;
            }
        }

        Ok(out)
    }

    fn render_json_in_csv(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.include_header {
            self.write_row(&mut out, &INLINE_HEADER)?;
        }

        for session in sessions {
            check_canceled(cancel)?;
            let mut entries = Vec::with_capacity(session.messages.len());
            for message in &session.messages {
                check_canceled(cancel)?;
                entries.push(MessageEntry::from(message));
            }
            let json = serde_json::to_string(&entries).map_err(|e| ExporterError::SerializationError {
                context: format!("messages of session {}", session.id),
                source: e,
            })?;
            self.write_row(
                &mut out,
                &[&session.id, &session.topic, &session.memory_prompt, &json],
            )?;
        }

        Ok(out)
    }

    fn render_sessions_table(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.include_header {
            self.write_row(&mut out, &SESSIONS_HEADER)?;
        }

        for session in sessions {
            check_canceled(cancel)?;
            self.write_row(
                &mut out,
                &[
                    &session.id,
                    &session.topic,
                    &session.memory_prompt,
                    session.model().unwrap_or(""),
                    &session.last_update().unwrap_or_default(),
                    &session.message_count().to_string(),
                ],
            )?;
        }

        Ok(out)
    }

    fn render_messages_table(&self, sessions: &[Session], cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.include_header {
            self.write_row(&mut out, &MESSAGES_HEADER)?;
        }

        for session in sessions {
            check_canceled(cancel)?;
            for (index, message) in session.messages.iter().enumerate() {
                check_canceled(cancel)?;
                self.write_row(
                    &mut out,
                    &[
                        &session.id,
                        &message.role,
                        &index.to_string(),
                        &message.content_text(),
                    ],
                )?;
            }
        }

        Ok(out)
    }

    /// Escape a field value for CSV.
    #[must_use]
    pub fn escape_field<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let needs_quoting = value
            .chars()
            .any(|c| c == self.delimiter || c == self.quote_char || c.is_control());

        if needs_quoting {
            let quote = self.quote_char.to_string();
            let escaped = value.replace(self.quote_char, &quote.repeat(2));
            Cow::Owned(format!("{quote}{escaped}{quote}"))
        } else {
            Cow::Borrowed(value)
        }
    }

    /// Write a CSV row.
    fn write_row<W: Write>(&self, writer: &mut W, fields: &[&str]) -> Result<()> {
        let line: Vec<Cow<'_, str>> = fields.iter().map(|f| self.escape_field(f)).collect();
        write!(
            writer,
            "{}{}",
            line.join(&self.delimiter.to_string()),
            self.line_ending.as_str()
        )?;
        Ok(())
    }
}
