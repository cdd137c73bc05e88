//! Error types for chat-exporter.
//!
//! Every fallible operation returns [`ExporterError`]. Callers that need to
//! branch on the failure category use [`ExporterError::kind`], which maps each
//! variant onto the closed [`ErrorKind`] enumeration.

use std::path::PathBuf;

use thiserror::Error;

/// Closed classification of every failure the crate can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input too damaged to recover.
    RepairFailed,
    /// Valid JSON, wrong shape.
    MalformedSchema,
    /// Input is not syntactically valid JSON.
    InvalidJson,
    /// User or signal requested an abort.
    Canceled,
    /// Underlying storage read/write failed.
    IoFailure,
    /// Output kind, layout or destination outside the recognized set.
    InvalidSelection,
    /// Unexpected internal failure (serialization, configuration).
    Internal,
}

impl ErrorKind {
    /// Short machine-friendly name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RepairFailed => "repair_failed",
            Self::MalformedSchema => "malformed_schema",
            Self::InvalidJson => "invalid_json",
            Self::Canceled => "canceled",
            Self::IoFailure => "io_failure",
            Self::InvalidSelection => "invalid_selection",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary error type for chat-exporter operations.
#[derive(Error, Debug)]
pub enum ExporterError {
    /// The repair engine could not produce a usable document.
    #[error("Repair failed: {reason}")]
    RepairFailed {
        /// Why the input could not be recovered.
        reason: String,
    },

    /// The JSON parsed, but does not match the session store shape.
    #[error("Unexpected archive structure: {message}")]
    MalformedSchema {
        /// Human-readable description of the mismatch.
        message: String,
        /// Underlying deserialization error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The input is not valid JSON.
    #[error("Invalid JSON at line {line}, column {column}: {message} (try the `repair` command)")]
    InvalidJson {
        /// Line of the syntax error (1-based).
        line: usize,
        /// Column of the syntax error (1-based).
        column: usize,
        /// Parser message.
        message: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Operation canceled by the user.
    #[error("Operation canceled")]
    Canceled,

    /// I/O error with the operation and path that failed.
    #[error("Failed to {operation} {}: {source}", .path.display())]
    Io {
        /// Operation that failed ("read", "write", ...).
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error without a specific path (stdin, stdout).
    #[error("I/O error: {context}: {source}")]
    IoError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied an option outside the recognized set.
    #[error("Invalid {what}: {value}")]
    InvalidSelection {
        /// Which selection was invalid ("output option", "CSV layout", ...).
        what: &'static str,
        /// Offending value.
        value: String,
    },

    /// Serialization error.
    #[error("Serialization error: {context}")]
    SerializationError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message.
        message: String,
    },
}

impl ExporterError {
    /// Create a repair failure.
    #[must_use]
    pub fn repair(reason: impl Into<String>) -> Self {
        Self::RepairFailed {
            reason: reason.into(),
        }
    }

    /// Create a schema error without a source.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::MalformedSchema {
            message: message.into(),
            source: None,
        }
    }

    /// Create a schema error from a deserialization failure.
    #[must_use]
    pub fn schema_with_source(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedSchema {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a syntax error from a serde_json parse failure.
    #[must_use]
    pub fn invalid_json(source: serde_json::Error) -> Self {
        Self::InvalidJson {
            line: source.line(),
            column: source.column(),
            message: source.to_string(),
            source,
        }
    }

    /// Create a path-scoped I/O error.
    #[must_use]
    pub fn io_at(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid-selection error.
    #[must_use]
    pub fn selection(what: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidSelection {
            what,
            value: value.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RepairFailed { .. } => ErrorKind::RepairFailed,
            Self::MalformedSchema { .. } => ErrorKind::MalformedSchema,
            Self::InvalidJson { .. } => ErrorKind::InvalidJson,
            Self::Canceled => ErrorKind::Canceled,
            Self::Io { .. } | Self::IoError { .. } => ErrorKind::IoFailure,
            Self::InvalidSelection { .. } => ErrorKind::InvalidSelection,
            Self::SerializationError { .. } | Self::InvalidConfig { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error is a user cancellation rather than a failure.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Get the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Canceled => exit_codes::EXIT_SUCCESS,
            ErrorKind::InvalidJson | ErrorKind::MalformedSchema => exit_codes::EXIT_PARSE_ERROR,
            ErrorKind::RepairFailed => exit_codes::EXIT_REPAIR_FAILED,
            ErrorKind::InvalidSelection => exit_codes::EXIT_USAGE_ERROR,
            ErrorKind::IoFailure => exit_codes::EXIT_IO_ERROR,
            ErrorKind::Internal => exit_codes::EXIT_GENERAL_ERROR,
        }
    }
}

/// Result type alias for chat-exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

impl From<std::io::Error> for ExporterError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            context: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            context: "JSON operation failed".to_string(),
            source: err,
        }
    }
}

/// Exit codes for CLI operations.
pub mod exit_codes {
    /// Operation completed successfully (also used for cancellation).
    pub const EXIT_SUCCESS: i32 = 0;
    /// General/unspecified error.
    pub const EXIT_GENERAL_ERROR: i32 = 1;
    /// Input could not be parsed or has the wrong shape.
    pub const EXIT_PARSE_ERROR: i32 = 2;
    /// Input was too damaged to repair.
    pub const EXIT_REPAIR_FAILED: i32 = 3;
    /// Invalid command-line usage (BSD standard).
    pub const EXIT_USAGE_ERROR: i32 = 64;
    /// I/O error (BSD standard).
    pub const EXIT_IO_ERROR: i32 = 74;
}
