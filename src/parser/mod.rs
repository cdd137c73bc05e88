//! Store loading for chat-session archives.
//!
//! Turns well-formed JSON bytes into an [`Archive`]. Syntax errors are
//! reported as [`ExporterError::InvalidJson`]; documents that parse but do not
//! have the session-store shape are reported as
//! [`ExporterError::MalformedSchema`].
//!
//! # Example
//!
//! ```rust
//! use chat_exporter::parser::StoreLoader;
//!
//! let json = br#"{"chat-next-web-store":{"sessions":[
//!     {"id":"1","topic":"Greeting","messages":[{"role":"user","content":"hi"}]}
//! ]}}"#;
//!
//! let mut loader = StoreLoader::new();
//! let archive = loader.load_bytes(json)?;
//! assert_eq!(archive.sessions().len(), 1);
//! assert_eq!(loader.stats().messages, 1);
//! # Ok::<(), chat_exporter::ExporterError>(())
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::{ExporterError, Result};
use crate::fs::FileSystem;
use crate::model::{json_type_name, Archive, Session, Store, UnknownFields, SESSIONS_KEY, STORE_KEY};

/// Statistics about the last load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Sessions loaded.
    pub sessions: usize,
    /// Messages loaded across all sessions.
    pub messages: usize,
    /// Sessions that carried opaque metadata fields.
    pub sessions_with_metadata: usize,
    /// Size of the input in bytes.
    pub input_bytes: usize,
}

/// Loader for exported session stores.
#[derive(Debug, Clone, Default)]
pub struct StoreLoader {
    /// Accept a store object at the top level, without the client's wrapper key.
    allow_bare_store: bool,
    stats: LoadStats,
}

impl StoreLoader {
    /// Create a loader with default settings (bare stores accepted).
    #[must_use]
    pub fn new() -> Self {
        Self {
            allow_bare_store: true,
            stats: LoadStats::default(),
        }
    }

    /// Require the client's `chat-next-web-store` wrapper key.
    #[must_use]
    pub fn with_bare_store(mut self, allow: bool) -> Self {
        self.allow_bare_store = allow;
        self
    }

    /// Statistics of the last successful load.
    #[must_use]
    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    /// Read an archive through the file-system capability and load it.
    #[instrument(skip(self, fs), fields(path = %path.as_ref().display()))]
    pub fn load_file(&mut self, fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<Archive> {
        let bytes = fs.read_file(path.as_ref())?;
        self.load_bytes(&bytes)
    }

    /// Parse and validate archive bytes.
    #[instrument(skip_all, fields(bytes = bytes.len()), level = "debug")]
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<Archive> {
        let value: Value = serde_json::from_slice(bytes).map_err(ExporterError::invalid_json)?;
        let archive = self.load_value(value)?;

        self.stats.input_bytes = bytes.len();
        debug!(
            sessions = self.stats.sessions,
            messages = self.stats.messages,
            "Archive loaded"
        );
        Ok(archive)
    }

    /// Validate an already-parsed JSON document.
    pub fn load_value(&mut self, value: Value) -> Result<Archive> {
        self.stats = LoadStats::default();

        let mut root = match value {
            Value::Object(root) => root,
            other => {
                return Err(ExporterError::schema(format!(
                    "expected a JSON object at the top level, found {}",
                    json_type_name(&other)
                )));
            }
        };

        let (store_map, nested, extra) = match root.remove(STORE_KEY) {
            Some(Value::Object(store)) => (store, true, into_unknown(root)),
            Some(other) => {
                return Err(ExporterError::schema(format!(
                    "`{STORE_KEY}` must be an object, found {}",
                    json_type_name(&other)
                )));
            }
            None if self.allow_bare_store && root.contains_key(SESSIONS_KEY) => {
                (root, false, UnknownFields::new())
            }
            None => {
                return Err(ExporterError::schema(format!(
                    "missing `{STORE_KEY}` object with a `{SESSIONS_KEY}` list"
                )));
            }
        };

        let store = parse_store(store_map)?;
        check_unique_ids(&store.sessions)?;

        self.stats.sessions = store.sessions.len();
        self.stats.messages = store.sessions.iter().map(Session::message_count).sum();
        self.stats.sessions_with_metadata =
            store.sessions.iter().filter(|s| !s.extra.is_empty()).count();

        Ok(Archive {
            store,
            nested,
            extra,
        })
    }
}

/// Check only the structural shape a store must have, without building the model.
///
/// Used by the repair engine to decide whether critical markers survived.
pub(crate) fn locate_sessions(root: &Value) -> Option<&Vec<Value>> {
    let store = root.get(STORE_KEY).unwrap_or(root);
    store.get(SESSIONS_KEY).and_then(Value::as_array)
}

fn parse_store(mut map: Map<String, Value>) -> Result<Store> {
    let sessions = match map.remove(SESSIONS_KEY) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ExporterError::schema(format!(
                "`{SESSIONS_KEY}` must be an array, found {}",
                json_type_name(&other)
            )));
        }
        None => {
            return Err(ExporterError::schema(format!(
                "store has no `{SESSIONS_KEY}` list"
            )));
        }
    };

    let sessions = sessions
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_session(index, item))
        .collect::<Result<Vec<_>>>()?;

    Ok(Store {
        sessions,
        extra: into_unknown(map),
    })
}

fn parse_session(index: usize, item: Value) -> Result<Session> {
    if !item.is_object() {
        return Err(ExporterError::schema(format!(
            "session #{index} must be an object, found {}",
            json_type_name(&item)
        )));
    }
    if item.get("id").is_none() {
        return Err(ExporterError::schema(format!("session #{index} has no `id`")));
    }

    serde_json::from_value(item)
        .map_err(|e| ExporterError::schema_with_source(format!("session #{index}: {e}"), e))
}

fn check_unique_ids(sessions: &[Session]) -> Result<()> {
    let mut seen = HashSet::with_capacity(sessions.len());
    for session in sessions {
        if !seen.insert(session.id.as_str()) {
            warn!(id = %session.id, "Duplicate session id");
            return Err(ExporterError::schema(format!(
                "duplicate session id `{}`",
                session.id
            )));
        }
    }
    Ok(())
}

fn into_unknown(map: Map<String, Value>) -> UnknownFields {
    map.into_iter().collect()
}
