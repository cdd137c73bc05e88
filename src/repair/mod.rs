//! Best-effort repair of corrupted session archives.
//!
//! Exports from the chat client are sometimes truncated mid-write or contain
//! raw control characters pasted into messages. [`RepairEngine`] turns such
//! bytes into a document that the [`StoreLoader`] accepts, or fails with
//! [`ExporterError::RepairFailed`].
//!
//! Repair runs in three passes:
//!
//! 1. Decode: strip a byte-order mark and replace invalid UTF-8.
//! 2. Scan: a single-pass state machine (see `scanner`) fixes syntax.
//! 3. Prune: sessions without an `id`, and messages without `role` or
//!    `content`, are dropped so the result loads cleanly.
//!
//! Input that is already a loadable archive is returned byte-for-byte.
//!
//! # Example
//!
//! ```rust
//! use chat_exporter::repair::{repair_session_data, FixKind};
//!
//! let truncated = br#"{"chat-next-web-store":{"sessions":[{"id":"1","messages":[{"role":"user","content":"hi"#;
//! let repaired = repair_session_data(truncated)?;
//! assert!(repaired.report.count(FixKind::UnterminatedString) == 1);
//! assert_eq!(repaired.sessions, 1);
//! # Ok::<(), chat_exporter::ExporterError>(())
//! ```

mod scanner;

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{ExporterError, Result};
use crate::model::{STORE_KEY, SESSIONS_KEY};
use crate::parser::{locate_sessions, StoreLoader};

use scanner::Scanner;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A corruption pattern the engine knows how to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    /// A UTF-8 byte-order mark before the document.
    ByteOrderMark,
    /// Bytes that were not valid UTF-8.
    InvalidUtf8,
    /// Text before the first `{` or `[`.
    LeadingGarbage,
    /// Text after the top-level value closed.
    TrailingContent,
    /// `,` directly before `]` or `}`.
    TrailingComma,
    /// `,,`, `[,` or `{,`.
    ExtraComma,
    /// Two elements with no comma between them.
    MissingComma,
    /// Raw control character inside a string.
    ControlCharacter,
    /// Backslash followed by something that is not a JSON escape.
    InvalidEscape,
    /// `"` inside a string that does not end it.
    UnescapedQuote,
    /// A closer of the wrong type; inner frames were closed first.
    MismatchedCloser,
    /// A closer with no matching opener.
    StrayCloser,
    /// String still open at end of input.
    UnterminatedString,
    /// `tru`, `nul`, `12.` and similar at end of input.
    TruncatedLiteral,
    /// Object key with no value.
    MissingValue,
    /// Object or array still open at end of input.
    UnclosedStructure,
    /// Session dropped for lacking an `id` or not being an object.
    DroppedSession,
    /// Message dropped for lacking `role` or `content`.
    DroppedMessage,
}

impl FixKind {
    /// Short human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ByteOrderMark => "byte-order mark removed",
            Self::InvalidUtf8 => "invalid UTF-8 replaced",
            Self::LeadingGarbage => "leading text removed",
            Self::TrailingContent => "trailing content removed",
            Self::TrailingComma => "trailing comma removed",
            Self::ExtraComma => "extra comma removed",
            Self::MissingComma => "missing comma inserted",
            Self::ControlCharacter => "control character escaped",
            Self::InvalidEscape => "invalid escape fixed",
            Self::UnescapedQuote => "unescaped quote escaped",
            Self::MismatchedCloser => "mismatched bracket fixed",
            Self::StrayCloser => "stray bracket removed",
            Self::UnterminatedString => "unterminated string closed",
            Self::TruncatedLiteral => "truncated literal completed",
            Self::MissingValue => "missing value set to null",
            Self::UnclosedStructure => "unclosed bracket closed",
            Self::DroppedSession => "incomplete session dropped",
            Self::DroppedMessage => "incomplete message dropped",
        }
    }
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One applied fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairAction {
    /// What was fixed.
    pub kind: FixKind,
    /// Character offset in the decoded input for syntax fixes; session or
    /// message index for pruning.
    pub position: usize,
}

/// Everything the engine changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Fixes in the order they were applied.
    pub actions: Vec<RepairAction>,
}

impl RepairReport {
    /// True when the input needed no changes.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of fixes of one kind.
    #[must_use]
    pub fn count(&self, kind: FixKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    /// Fix counts grouped by kind, in [`FixKind`] order.
    #[must_use]
    pub fn summary(&self) -> Vec<(FixKind, usize)> {
        let mut kinds: Vec<FixKind> = self.actions.iter().map(|a| a.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds.into_iter().map(|k| (k, self.count(k))).collect()
    }

    fn push(&mut self, kind: FixKind, position: usize) {
        self.actions.push(RepairAction { kind, position });
    }
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("no repairs needed");
        }
        let parts: Vec<String> = self
            .summary()
            .into_iter()
            .map(|(kind, n)| format!("{kind} ({n})"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Repaired archive bytes with a description of what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    /// Loadable JSON.
    pub bytes: Vec<u8>,
    /// Applied fixes.
    pub report: RepairReport,
    /// Sessions in the repaired archive.
    pub sessions: usize,
}

/// Repair engine.
#[derive(Debug, Clone)]
pub struct RepairEngine {
    prune_incomplete: bool,
    pretty: bool,
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairEngine {
    /// Create an engine that prunes incomplete records and re-serializes
    /// pretty-printed when it has to rebuild the document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prune_incomplete: true,
            pretty: true,
        }
    }

    /// Whether to drop sessions and messages missing required fields.
    /// Without pruning such input fails with `RepairFailed`.
    #[must_use]
    pub fn prune_incomplete(mut self, prune: bool) -> Self {
        self.prune_incomplete = prune;
        self
    }

    /// Pretty-print output when the document is rebuilt after pruning.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Repair `input` into a loadable archive.
    #[instrument(skip_all, fields(bytes = input.len()))]
    pub fn repair(&self, input: &[u8]) -> Result<Repaired> {
        let mut report = RepairReport::default();

        // Fast path: already valid JSON.
        let (text, mut value) = match serde_json::from_slice::<Value>(input) {
            Ok(value) => (Cow::Borrowed(input), value),
            Err(_) => {
                let repaired = self.repair_syntax(input, &mut report)?;
                let value = serde_json::from_str::<Value>(&repaired).map_err(|e| {
                    warn!(error = %e, "Scanner output is still not valid JSON");
                    ExporterError::repair(format!("could not recover valid JSON: {e}"))
                })?;
                (Cow::Owned(repaired.into_bytes()), value)
            }
        };

        if locate_sessions(&value).is_none() {
            return Err(ExporterError::repair(format!(
                "no `{SESSIONS_KEY}` list found (expected `{STORE_KEY}.{SESSIONS_KEY}` or a top-level `{SESSIONS_KEY}`)"
            )));
        }

        let pruned = if self.prune_incomplete {
            prune(&mut value, &mut report)
        } else {
            false
        };

        let bytes = if pruned {
            let serialized = if self.pretty {
                serde_json::to_vec_pretty(&value)
            } else {
                serde_json::to_vec(&value)
            };
            serialized.map_err(|e| ExporterError::repair(format!("could not serialize: {e}")))?
        } else {
            text.into_owned()
        };

        let mut loader = StoreLoader::new();
        loader
            .load_value(value)
            .map_err(|e| ExporterError::repair(format!("repaired document is not a valid archive: {e}")))?;
        let sessions = loader.stats().sessions;

        if report.is_clean() {
            debug!(sessions, "Archive needed no repair");
        } else {
            info!(fixes = report.actions.len(), sessions, "Archive repaired: {report}");
        }

        Ok(Repaired {
            bytes,
            report,
            sessions,
        })
    }

    fn repair_syntax(&self, input: &[u8], report: &mut RepairReport) -> Result<String> {
        let input = match input.strip_prefix(UTF8_BOM) {
            Some(rest) => {
                report.push(FixKind::ByteOrderMark, 0);
                rest
            }
            None => input,
        };

        let decoded = String::from_utf8_lossy(input);
        if let Cow::Owned(_) = decoded {
            report.push(FixKind::InvalidUtf8, 0);
        }

        if decoded.trim().is_empty() {
            return Err(ExporterError::repair("input is empty"));
        }

        let chars: Vec<char> = decoded.chars().collect();
        let scanned = Scanner::new(&chars).run();
        if !scanned.found_structure {
            return Err(ExporterError::repair("no JSON object or array found in input"));
        }

        report.actions.extend(scanned.actions);
        debug!(fixes = report.actions.len(), "Syntax pass complete");
        Ok(scanned.text)
    }
}

/// Repair with default settings.
pub fn repair_session_data(input: &[u8]) -> Result<Repaired> {
    RepairEngine::new().repair(input)
}

/// Drop sessions without an `id` and messages without `role`/`content`.
/// Returns whether anything was removed.
fn prune(root: &mut Value, report: &mut RepairReport) -> bool {
    let sessions = match root.get_mut(STORE_KEY) {
        Some(store) => store.get_mut(SESSIONS_KEY),
        None => root.get_mut(SESSIONS_KEY),
    };
    let Some(Value::Array(sessions)) = sessions else {
        return false;
    };

    let before = report.actions.len();

    let mut index = 0;
    sessions.retain(|session| {
        let keep = session
            .get("id")
            .is_some_and(|id| id.is_string() || id.is_number());
        if !keep {
            report.push(FixKind::DroppedSession, index);
        }
        index += 1;
        keep
    });

    for session in sessions.iter_mut() {
        if let Some(Value::Array(messages)) = session.get_mut("messages") {
            let mut index = 0;
            messages.retain(|message| {
                let keep = message.get("role").is_some_and(Value::is_string)
                    && message.get("content").is_some();
                if !keep {
                    report.push(FixKind::DroppedMessage, index);
                }
                index += 1;
                keep
            });
        }
    }

    let dropped = report.actions.len() - before;
    if dropped > 0 {
        warn!(dropped, "Dropped incomplete records");
    }
    dropped > 0
}
