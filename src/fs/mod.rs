//! File-system capability.
//!
//! The pipeline never touches storage directly. Everything goes through
//! [`FileSystem`], which has exactly three operations. [`RealFileSystem`]
//! writes atomically to disk; [`MemoryFileSystem`] keeps files in a map so
//! that tests can observe what was (and was not) written.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::util::{atomic_write, read_error};

/// Default permission bits for written files.
pub const DEFAULT_PERMISSIONS: u32 = 0o644;

/// Narrow storage contract consumed by the loader and the export coordinator.
pub trait FileSystem: Send + Sync {
    /// Read the whole file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or replace the file with `contents`. `permissions` are Unix
    /// mode bits; implementations without permissions ignore them.
    fn write_file(&self, path: &Path, contents: &[u8], permissions: u32) -> Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// Disk-backed file system. Writes are atomic (temp file + rename).
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| read_error(path, e))
    }

    fn write_file(&self, path: &Path, contents: &[u8], permissions: u32) -> Result<()> {
        debug!(path = %path.display(), bytes = contents.len(), "Writing file");
        atomic_write(path, contents, Some(permissions))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// A file held by [`MemoryFileSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// File contents.
    pub contents: Vec<u8>,
    /// Permission bits given at write time.
    pub permissions: u32,
}

/// In-memory file system for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, MemoryFile>>,
    read_only: bool,
}

impl MemoryFileSystem {
    /// Create an empty file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: pre-populate a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.lock().insert(
            path.into(),
            MemoryFile {
                contents: contents.into(),
                permissions: DEFAULT_PERMISSIONS,
            },
        );
        self
    }

    /// Builder: reject every write with a permission error.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Contents of a file, if present.
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).map(|f| f.contents.clone())
    }

    /// Contents of a file as UTF-8 text, if present and valid.
    #[must_use]
    pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
        self.contents(path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Stored file metadata.
    #[must_use]
    pub fn file(&self, path: impl AsRef<Path>) -> Option<MemoryFile> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    /// All stored paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether no files are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.contents(path)
            .ok_or_else(|| read_error(path, io::Error::new(io::ErrorKind::NotFound, "no such file")))
    }

    fn write_file(&self, path: &Path, contents: &[u8], permissions: u32) -> Result<()> {
        if self.read_only {
            return Err(ExporterError::io_at(
                "write",
                path.to_path_buf(),
                io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
            ));
        }
        self.files.lock().insert(
            path.to_path_buf(),
            MemoryFile {
                contents: contents.to_vec(),
                permissions,
            },
        );
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }
}
