//! Utility functions for common operations.
//!
//! - Atomic file writes (temp file in the target directory, then rename)
//! - Output file naming helpers

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ExporterError, Result};

/// Atomically write content to a file.
///
/// The content goes to a temporary file in the same directory, which is
/// flushed and then renamed over the target. If any step fails the target is
/// left untouched. `permissions` is applied to the file on Unix.
///
/// # Example
///
/// ```rust,no_run
/// use chat_exporter::util::atomic_write;
///
/// atomic_write("sessions.csv", b"session_id\n", Some(0o644)).unwrap();
/// ```
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8], permissions: Option<u32>) -> Result<()> {
    let mut atomic = AtomicFile::create(path)?;
    atomic.writer().write_all(content).map_err(|e| {
        ExporterError::io_at("write", atomic.target_path().to_path_buf(), e)
    })?;
    if let Some(mode) = permissions {
        atomic.set_permissions(mode)?;
    }
    atomic.finish()
}

/// An atomic file writer.
///
/// Writes go to a `NamedTempFile`; [`AtomicFile::finish`] renames it over the
/// target. Dropping an unfinished `AtomicFile` discards the temporary file
/// without touching the target.
pub struct AtomicFile {
    temp_file: NamedTempFile,
    target_path: PathBuf,
}

impl AtomicFile {
    /// Create a new atomic file writer for the given target path.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let parent = parent_dir(path);

        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExporterError::io_at("create directory", parent.to_path_buf(), e))?;
        }

        // Same directory as the target so the final rename stays on one filesystem.
        let temp_file = NamedTempFile::new_in(parent)
            .map_err(|e| ExporterError::io_at("create temporary file in", parent.to_path_buf(), e))?;

        Ok(Self {
            temp_file,
            target_path: path.to_path_buf(),
        })
    }

    /// Get a mutable reference to the underlying writer.
    pub fn writer(&mut self) -> &mut NamedTempFile {
        &mut self.temp_file
    }

    /// Path the file will be renamed to.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Set Unix permission bits on the pending file. No-op elsewhere.
    #[cfg_attr(not(unix), allow(unused_variables))]
    pub fn set_permissions(&self, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            self.temp_file
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(mode))
                .map_err(|e| ExporterError::io_at("set permissions on", self.target_path.clone(), e))?;
        }
        Ok(())
    }

    /// Finish the atomic write by flushing and renaming the temp file.
    pub fn finish(mut self) -> Result<()> {
        self.temp_file
            .flush()
            .map_err(|e| ExporterError::io_at("flush", self.target_path.clone(), e))?;

        self.temp_file
            .persist(&self.target_path)
            .map_err(|e| ExporterError::io_at("write", self.target_path.clone(), e.error))?;

        Ok(())
    }
}

/// Directory containing `path`; `.` for bare file names.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Append `.ext` to `name` unless it already ends with that extension
/// (case-insensitive).
///
/// ```rust
/// use chat_exporter::util::ensure_extension;
/// use std::path::PathBuf;
///
/// assert_eq!(ensure_extension("out", "csv"), PathBuf::from("out.csv"));
/// assert_eq!(ensure_extension("out.CSV", "csv"), PathBuf::from("out.CSV"));
/// assert_eq!(ensure_extension("out.v2", "csv"), PathBuf::from("out.v2.csv"));
/// ```
#[must_use]
pub fn ensure_extension(name: impl AsRef<Path>, ext: &str) -> PathBuf {
    let name = name.as_ref();
    let has_ext = name
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext));
    if has_ext {
        name.to_path_buf()
    } else {
        let mut os = name.as_os_str().to_os_string();
        os.push(".");
        os.push(ext);
        PathBuf::from(os)
    }
}

/// Path of the repaired copy of `original`: `<prefix><file name>` in the same
/// directory.
#[must_use]
pub fn repaired_path(original: &Path, prefix: &str) -> PathBuf {
    let file_name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.json".to_string());
    let repaired = format!("{prefix}{file_name}");
    match original.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(repaired),
        _ => PathBuf::from(repaired),
    }
}

/// Map an I/O error for a read of `path`, keeping the path in the message.
pub(crate) fn read_error(path: &Path, err: io::Error) -> ExporterError {
    ExporterError::io_at("read", path.to_path_buf(), err)
}
