//! Synthetic archive generators.
//!
//! Builds chat-store exports of arbitrary size for tests and benchmarks.

#![allow(dead_code)]

use serde_json::{json, Value};

/// Configuration for generating a synthetic archive.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Number of sessions.
    pub sessions: usize,
    /// Messages per session.
    pub messages_per_session: usize,
    /// Approximate length of each message body in characters.
    pub avg_text_length: usize,
    /// Sprinkle commas, quotes and newlines into message bodies.
    pub tricky_text: bool,
    /// Nest the store under the client's wrapper key.
    pub nested: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            sessions: 5,
            messages_per_session: 4,
            avg_text_length: 80,
            tricky_text: true,
            nested: true,
        }
    }
}

impl ArchiveConfig {
    /// A small archive for quick tests.
    pub fn minimal() -> Self {
        Self {
            sessions: 2,
            messages_per_session: 2,
            avg_text_length: 20,
            ..Default::default()
        }
    }

    /// A large archive for benchmarks.
    pub fn large() -> Self {
        Self {
            sessions: 200,
            messages_per_session: 50,
            avg_text_length: 400,
            ..Default::default()
        }
    }

    /// Total number of messages the archive will contain.
    pub fn message_count(&self) -> usize {
        self.sessions * self.messages_per_session
    }
}

const WORDS: [&str; 12] = [
    "borrow", "lifetime", "trait", "closure", "iterator", "async", "future", "slice", "vector",
    "string", "module", "crate",
];

fn message_text(seed: usize, config: &ArchiveConfig) -> String {
    let mut text = String::with_capacity(config.avg_text_length + 16);
    let mut i = seed;
    while text.len() < config.avg_text_length {
        text.push_str(WORDS[i % WORDS.len()]);
        i = i.wrapping_mul(31).wrapping_add(7);
        text.push(if config.tricky_text && i % 5 == 0 { ',' } else { ' ' });
    }
    if config.tricky_text && seed % 3 == 0 {
        text.push_str("\n\"quoted\" tail");
    }
    text
}

/// Generate an archive as a JSON value.
pub fn generate_archive(config: &ArchiveConfig) -> Value {
    let sessions: Vec<Value> = (0..config.sessions)
        .map(|s| {
            let messages: Vec<Value> = (0..config.messages_per_session)
                .map(|m| {
                    json!({
                        "id": format!("msg-{s}-{m}"),
                        "date": "2024-01-01 12:00",
                        "role": if m % 2 == 0 { "user" } else { "assistant" },
                        "content": message_text(s * 1000 + m, config),
                    })
                })
                .collect();
            json!({
                "id": format!("session-{s}"),
                "topic": format!("Topic {s}"),
                "memoryPrompt": "",
                "messages": messages,
                "lastUpdate": 1_704_067_200_000_u64 + s as u64,
                "mask": {"modelConfig": {"model": "gpt-4"}},
            })
        })
        .collect();

    let store = json!({ "sessions": sessions, "currentSessionIndex": 0 });
    if config.nested {
        json!({ "chat-next-web-store": store })
    } else {
        store
    }
}

/// Generate an archive as serialized bytes.
pub fn generate_archive_bytes(config: &ArchiveConfig) -> Vec<u8> {
    serde_json::to_vec(&generate_archive(config)).expect("generated archive serializes")
}
