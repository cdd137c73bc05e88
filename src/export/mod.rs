//! Export functionality for session archives.
//!
//! This module provides the output side of the pipeline:
//! - CSV: four layouts of the same session data (see [`CsvLayout`])
//! - Dataset: a flat JSON array of message records for ML tooling
//! - [`ExportCoordinator`]: picks the formatter, confirms destinations and
//!   hands finished bytes to the [`FileSystem`](crate::fs::FileSystem)
//!
//! Formatters render into memory. Nothing reaches a destination until
//! formatting has completed, so a canceled export never leaves a partial file.

mod coordinator;
mod csv;
mod dataset;

pub use coordinator::*;
pub use csv::*;
pub use dataset::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ExporterError, Result};

/// Top-level output kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One or two CSV files.
    Csv,
    /// A JSON dataset file.
    Dataset,
}

impl OutputKind {
    /// All kinds in menu order.
    pub const ALL: [Self; 2] = [Self::Csv, Self::Dataset];

    /// Get the file extension for this kind.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Dataset => "json",
        }
    }

    /// Menu label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Dataset => "JSON dataset",
        }
    }
}

impl FromStr for OutputKind {
    type Err = ExporterError;

    /// Accepts a name or the menu number.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "csv" => Ok(Self::Csv),
            "2" | "dataset" | "json" => Ok(Self::Dataset),
            _ => Err(ExporterError::selection("output option", s.trim())),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// CSV layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CsvLayout {
    /// One row per session, messages joined into one cell.
    #[default]
    Inline,
    /// One row per message.
    PerLine,
    /// A sessions file and a messages file linked by session id.
    SeparateFiles,
    /// One row per session, messages as a JSON array in one cell.
    JsonInCsv,
}

impl CsvLayout {
    /// All layouts in menu order.
    pub const ALL: [Self; 4] = [Self::Inline, Self::PerLine, Self::SeparateFiles, Self::JsonInCsv];

    /// Canonical name, as accepted by [`FromStr`] and the config file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::PerLine => "per-line",
            Self::SeparateFiles => "separate-files",
            Self::JsonInCsv => "json-in-csv",
        }
    }

    /// Menu label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inline => "Inline formatting",
            Self::PerLine => "One message per line",
            Self::SeparateFiles => "Separate files for sessions and messages",
            Self::JsonInCsv => "JSON string in CSV",
        }
    }

    /// Whether this layout produces two files.
    #[must_use]
    pub const fn is_separate(&self) -> bool {
        matches!(self, Self::SeparateFiles)
    }
}

impl FromStr for CsvLayout {
    type Err = ExporterError;

    /// Accepts a name (dashes or underscores) or the menu number.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "1" | "inline" => Ok(Self::Inline),
            "2" | "per-line" | "perline" => Ok(Self::PerLine),
            "3" | "separate-files" | "separate" => Ok(Self::SeparateFiles),
            "4" | "json-in-csv" | "json" => Ok(Self::JsonInCsv),
            _ => Err(ExporterError::selection("CSV layout", s.trim())),
        }
    }
}

impl fmt::Display for CsvLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CSV record terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// The platform convention: CRLF on Windows, LF elsewhere.
    #[must_use]
    pub const fn platform() -> Self {
        if cfg!(windows) {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// The terminator bytes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::platform()
    }
}

/// Fail with [`ExporterError::Canceled`] once `cancel` has fired.
pub(crate) fn check_canceled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ExporterError::Canceled)
    } else {
        Ok(())
    }
}
