//! Data model for chat-session archives.
//!
//! The browser client exports its whole local store as one JSON document.
//! Only the session list is interpreted; everything else (app config, masks,
//! per-session statistics) is carried through as opaque fields so that a
//! repaired or re-serialized archive loses nothing.

pub mod session;

pub use session::*;

use indexmap::IndexMap;
use serde_json::Value;

/// Opaque JSON fields preserved in source key order.
pub type UnknownFields = IndexMap<String, Value>;

/// Key under which the client nests its chat store.
pub const STORE_KEY: &str = "chat-next-web-store";

/// Key of the session collection inside the store.
pub const SESSIONS_KEY: &str = "sessions";
