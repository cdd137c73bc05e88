//! chat-exporter: repair and export tool for chat-session archives.
//!
//! The browser chat client exports its local store as a single JSON document.
//! Those exports are frequently damaged (truncated downloads, hand edits,
//! stray control characters). This crate repairs them and turns the session
//! list into CSV or a flat JSON dataset.
//!
//! # Quick Start
//!
//! ```rust
//! use chat_exporter::export::{CsvFormatter, CsvLayout, CsvOutput};
//! use chat_exporter::parser::StoreLoader;
//! use chat_exporter::repair::RepairEngine;
//! use tokio_util::sync::CancellationToken;
//!
//! fn main() -> chat_exporter::Result<()> {
//!     // A truncated export: the closing brackets never made it to disk.
//!     let raw = br#"{"sessions":[{"id":"s1","topic":"Hi","messages":[{"role":"user","content":"hello"}"#;
//!
//!     let repaired = RepairEngine::new().repair(raw)?;
//!     let archive = StoreLoader::new().load_bytes(&repaired.bytes)?;
//!
//!     let csv = CsvFormatter::new(CsvLayout::PerLine).format(archive.sessions(), &CancellationToken::new())?;
//!     if let CsvOutput::Single(bytes) = csv {
//!         assert!(String::from_utf8_lossy(&bytes).contains("hello"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`repair`]: byte-level JSON repair with a report of every fix
//! - [`parser`]: loads repaired bytes into the [`model`]
//! - [`export`]: CSV layouts, dataset records and the export coordinator
//! - [`fs`]: the storage capability used for every read and write
//! - [`config`]: TOML configuration
//! - [`cli`]: command-line interface
//! - [`error`]: error types and exit codes

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fs;
pub mod model;
pub mod parser;
pub mod repair;
pub mod util;

pub use error::{ErrorKind, ExporterError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, ExporterError, Result};
    pub use crate::export::{
        CsvFormatter, CsvLayout, CsvOutput, DatasetExtractor, ExportCoordinator, ExportOutcome,
        ExportRequest, OutputKind,
    };
    pub use crate::fs::{FileSystem, MemoryFileSystem, RealFileSystem};
    pub use crate::model::{Archive, Message, Session};
    pub use crate::parser::StoreLoader;
    pub use crate::repair::{RepairEngine, RepairReport};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
