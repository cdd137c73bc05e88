//! Export coordination: destination naming, overwrite confirmation and writes.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ExporterError, Result};
use crate::fs::{FileSystem, DEFAULT_PERMISSIONS};
use crate::model::Session;
use crate::repair::{RepairEngine, Repaired};
use crate::util::{ensure_extension, repaired_path};

use super::{
    check_canceled, CsvFormatter, CsvLayout, CsvOutput, DatasetExtractor, DatasetGranularity,
    LineEnding, OutputKind,
};

/// Decides whether an existing destination may be replaced.
pub trait OverwriteConfirm: Send + Sync {
    /// Return `Ok(true)` to overwrite `path`. Interactive implementations may
    /// fail with [`ExporterError::Canceled`].
    fn confirm_overwrite(&self, path: &Path) -> impl Future<Output = Result<bool>> + Send;
}

/// Overwrite without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOverwrite;

impl OverwriteConfirm for AlwaysOverwrite {
    async fn confirm_overwrite(&self, _path: &Path) -> Result<bool> {
        Ok(true)
    }
}

/// Never replace an existing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverOverwrite;

impl OverwriteConfirm for NeverOverwrite {
    async fn confirm_overwrite(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }
}

/// What to export and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Output kind.
    pub kind: OutputKind,
    /// CSV layout; required when `kind` is CSV.
    pub layout: Option<CsvLayout>,
    /// Destination. For separate files, the sessions file.
    pub destination: PathBuf,
    /// Messages file for the separate-files layout.
    pub messages_destination: Option<PathBuf>,
}

impl ExportRequest {
    /// Single-file CSV export.
    #[must_use]
    pub fn csv(layout: CsvLayout, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: OutputKind::Csv,
            layout: Some(layout),
            destination: destination.into(),
            messages_destination: None,
        }
    }

    /// Separate sessions and messages CSV files.
    #[must_use]
    pub fn separate_csv(sessions: impl Into<PathBuf>, messages: impl Into<PathBuf>) -> Self {
        Self {
            kind: OutputKind::Csv,
            layout: Some(CsvLayout::SeparateFiles),
            destination: sessions.into(),
            messages_destination: Some(messages.into()),
        }
    }

    /// JSON dataset export.
    #[must_use]
    pub fn dataset(destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: OutputKind::Dataset,
            layout: None,
            destination: destination.into(),
            messages_destination: None,
        }
    }

    /// Check the selection and resolve final destination paths (with
    /// extensions), in write order.
    pub fn destinations(&self) -> Result<Vec<PathBuf>> {
        let ext = self.kind.extension();
        let primary = resolve(&self.destination, "destination", ext)?;

        match (self.kind, self.layout) {
            (OutputKind::Csv, None) => Err(ExporterError::selection("CSV layout", "none")),
            (OutputKind::Csv, Some(CsvLayout::SeparateFiles)) => {
                let messages = self
                    .messages_destination
                    .as_deref()
                    .ok_or_else(|| ExporterError::selection("messages destination", ""))?;
                let messages = resolve(messages, "messages destination", ext)?;
                if messages == primary {
                    return Err(ExporterError::selection(
                        "messages destination",
                        format!("{} (same as sessions destination)", messages.display()),
                    ));
                }
                Ok(vec![primary, messages])
            }
            _ => Ok(vec![primary]),
        }
    }
}

fn resolve(name: &Path, what: &'static str, ext: &str) -> Result<PathBuf> {
    if name.as_os_str().is_empty() || name.to_string_lossy().trim().is_empty() {
        return Err(ExporterError::selection(what, ""));
    }
    Ok(ensure_extension(name, ext))
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Files written, in order.
    Written(Vec<PathBuf>),
    /// The user declined to overwrite this existing file; nothing was written.
    Declined(PathBuf),
}

/// Formatting and write settings, usually taken from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Write a CSV header row.
    pub csv_header: bool,
    /// CSV field delimiter.
    pub csv_delimiter: char,
    /// CSV record terminator.
    pub line_ending: LineEnding,
    /// Pretty-print datasets.
    pub dataset_pretty: bool,
    /// Dataset record granularity.
    pub dataset_granularity: DatasetGranularity,
    /// Unix permission bits for written files.
    pub permissions: u32,
    /// File-name prefix for repaired archives.
    pub repair_prefix: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            csv_header: true,
            csv_delimiter: ',',
            line_ending: LineEnding::platform(),
            dataset_pretty: false,
            dataset_granularity: DatasetGranularity::Message,
            permissions: DEFAULT_PERMISSIONS,
            repair_prefix: "repaired_".to_string(),
        }
    }
}

/// Dispatches to the formatters and writes through a [`FileSystem`].
pub struct ExportCoordinator<'a, C> {
    fs: &'a dyn FileSystem,
    confirm: &'a C,
    settings: ExportSettings,
}

impl<'a, C: OverwriteConfirm> ExportCoordinator<'a, C> {
    /// Create a coordinator with default settings.
    pub fn new(fs: &'a dyn FileSystem, confirm: &'a C) -> Self {
        Self {
            fs,
            confirm,
            settings: ExportSettings::default(),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Export `sessions` as requested.
    ///
    /// Order of work: validate the request, confirm every existing
    /// destination, render all outputs in memory, then write each file. The
    /// token is checked before each of these steps and before every write.
    #[instrument(skip_all, fields(kind = %request.kind, sessions = sessions.len()))]
    pub async fn export(
        &self,
        request: &ExportRequest,
        sessions: &[Session],
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome> {
        let destinations = request.destinations()?;
        check_canceled(cancel)?;

        for path in &destinations {
            if self.fs.exists(path) {
                check_canceled(cancel)?;
                if !self.confirm.confirm_overwrite(path).await? {
                    info!(path = %path.display(), "Overwrite declined");
                    return Ok(ExportOutcome::Declined(path.clone()));
                }
            }
        }

        let rendered = self.render(request, sessions, cancel)?;

        let mut written = Vec::with_capacity(destinations.len());
        for (path, bytes) in destinations.into_iter().zip(rendered) {
            check_canceled(cancel)?;
            self.fs.write_file(&path, &bytes, self.settings.permissions)?;
            info!(path = %path.display(), bytes = bytes.len(), "Export written");
            written.push(path);
        }

        Ok(ExportOutcome::Written(written))
    }

    fn render(
        &self,
        request: &ExportRequest,
        sessions: &[Session],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>> {
        match request.kind {
            OutputKind::Csv => {
                let layout = request.layout.unwrap_or_default();
                let formatter = CsvFormatter::new(layout)
                    .with_header(self.settings.csv_header)
                    .with_delimiter(self.settings.csv_delimiter)
                    .with_line_ending(self.settings.line_ending);
                Ok(match formatter.format(sessions, cancel)? {
                    CsvOutput::Single(bytes) => vec![bytes],
                    CsvOutput::Separate { sessions, messages } => vec![sessions, messages],
                })
            }
            OutputKind::Dataset => {
                let extractor = DatasetExtractor::new()
                    .pretty(self.settings.dataset_pretty)
                    .with_granularity(self.settings.dataset_granularity);
                Ok(vec![extractor.extract(sessions, cancel)?])
            }
        }
    }

    /// Repair the archive at `input` and write `<prefix><file name>` next to
    /// it. The original file is never modified. An existing repaired copy is
    /// replaced only if the confirmer agrees.
    #[instrument(skip(self, cancel), fields(input = %input.display()))]
    pub async fn repair_file(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<(ExportOutcome, Repaired)> {
        let bytes = self.fs.read_file(input)?;
        let repaired = RepairEngine::new().repair(&bytes)?;

        let output = repaired_path(input, &self.settings.repair_prefix);
        if output == input {
            return Err(ExporterError::selection(
                "repair prefix",
                "empty (the repaired file would replace the original)",
            ));
        }

        check_canceled(cancel)?;
        if self.fs.exists(&output) && !self.confirm.confirm_overwrite(&output).await? {
            info!(path = %output.display(), "Overwrite declined");
            return Ok((ExportOutcome::Declined(output), repaired));
        }

        check_canceled(cancel)?;
        self.fs
            .write_file(&output, &repaired.bytes, self.settings.permissions)?;
        debug!(output = %output.display(), "Repaired archive written");
        Ok((ExportOutcome::Written(vec![output]), repaired))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fs::MemoryFileSystem;
    use crate::parser::StoreLoader;
    use pretty_assertions::assert_eq;

    const ARCHIVE: &str = r#"{"chat-next-web-store":{"sessions":[
        {"id":"s1","topic":"One","messages":[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]},
        {"id":"s2","topic":"Two","messages":[{"role":"user","content":"c"}]}
    ]}}"#;

    fn sessions() -> Vec<Session> {
        StoreLoader::new()
            .load_bytes(ARCHIVE.as_bytes())
            .unwrap()
            .store
            .sessions
    }

    fn lf() -> ExportSettings {
        ExportSettings {
            line_ending: LineEnding::Lf,
            ..ExportSettings::default()
        }
    }

    #[tokio::test]
    async fn test_csv_export_appends_extension() {
        let fs = MemoryFileSystem::new();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite).with_settings(lf());

        let outcome = coordinator
            .export(
                &ExportRequest::csv(CsvLayout::PerLine, "out"),
                &sessions(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Written(vec![PathBuf::from("out.csv")]));
        assert_eq!(fs.text("out.csv").unwrap().lines().count(), 4);
        assert_eq!(fs.file("out.csv").unwrap().permissions, DEFAULT_PERMISSIONS);
    }

    #[tokio::test]
    async fn test_separate_files_written_in_order() {
        let fs = MemoryFileSystem::new();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite).with_settings(lf());

        let outcome = coordinator
            .export(
                &ExportRequest::separate_csv("sessions", "messages.csv"),
                &sessions(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExportOutcome::Written(vec![
                PathBuf::from("sessions.csv"),
                PathBuf::from("messages.csv")
            ])
        );
        assert!(fs.text("sessions.csv").unwrap().contains("s2,Two,,,,1"));
        assert!(fs.text("messages.csv").unwrap().contains("s1,assistant,1,b"));
    }

    #[tokio::test]
    async fn test_dataset_export() {
        let fs = MemoryFileSystem::new();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);

        coordinator
            .export(&ExportRequest::dataset("train"), &sessions(), &CancellationToken::new())
            .await
            .unwrap();

        let records: serde_json::Value = serde_json::from_slice(&fs.contents("train.json").unwrap()).unwrap();
        assert_eq!(records.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_declined_overwrite_leaves_file() {
        let fs = MemoryFileSystem::new().with_file("out.csv", "original");
        let coordinator = ExportCoordinator::new(&fs, &NeverOverwrite);

        let outcome = coordinator
            .export(
                &ExportRequest::csv(CsvLayout::Inline, "out.csv"),
                &sessions(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Declined(PathBuf::from("out.csv")));
        assert_eq!(fs.text("out.csv").unwrap(), "original");
    }

    #[tokio::test]
    async fn test_declined_second_file_writes_nothing() {
        let fs = MemoryFileSystem::new().with_file("messages.csv", "original");
        let coordinator = ExportCoordinator::new(&fs, &NeverOverwrite);

        let outcome = coordinator
            .export(
                &ExportRequest::separate_csv("sessions", "messages"),
                &sessions(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Declined(PathBuf::from("messages.csv")));
        assert!(!fs.exists(Path::new("sessions.csv")));
    }

    #[tokio::test]
    async fn test_canceled_before_write_creates_nothing() {
        let fs = MemoryFileSystem::new();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);
        let token = CancellationToken::new();
        token.cancel();

        let err = coordinator
            .export(&ExportRequest::separate_csv("s", "m"), &sessions(), &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert!(fs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected_before_side_effects() {
        let fs = MemoryFileSystem::new();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);
        let token = CancellationToken::new();

        let mut no_layout = ExportRequest::csv(CsvLayout::Inline, "out");
        no_layout.layout = None;
        let mut no_messages = ExportRequest::separate_csv("s", "m");
        no_messages.messages_destination = None;

        for request in [
            no_layout,
            no_messages,
            ExportRequest::dataset(""),
            ExportRequest::csv(CsvLayout::PerLine, "   "),
            ExportRequest::separate_csv("same", "same.csv"),
        ] {
            let err = coordinator.export(&request, &sessions(), &token).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSelection, "{request:?}");
        }
        assert!(fs.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_io_failure() {
        let fs = MemoryFileSystem::new().read_only();
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);

        let err = coordinator
            .export(&ExportRequest::dataset("out"), &sessions(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[tokio::test]
    async fn test_repair_file_writes_next_to_input() {
        let fs = MemoryFileSystem::new().with_file("dir/chat.json", &ARCHIVE[..ARCHIVE.len() - 8]);
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);

        let (outcome, repaired) = coordinator
            .repair_file(Path::new("dir/chat.json"), &CancellationToken::new())
            .await
            .unwrap();

        let path = PathBuf::from("dir/repaired_chat.json");
        assert_eq!(outcome, ExportOutcome::Written(vec![path.clone()]));
        assert!(!repaired.report.is_clean());
        let archive = StoreLoader::new().load_bytes(&fs.contents(&path).unwrap()).unwrap();
        assert_eq!(archive.sessions().len(), 2);
        assert_eq!(fs.text("dir/chat.json").unwrap(), &ARCHIVE[..ARCHIVE.len() - 8]);
    }

    #[tokio::test]
    async fn test_repair_file_respects_declined_overwrite() {
        let fs = MemoryFileSystem::new()
            .with_file("chat.json", &ARCHIVE[..ARCHIVE.len() - 8])
            .with_file("repaired_chat.json", "keep");

        let (outcome, _) = ExportCoordinator::new(&fs, &NeverOverwrite)
            .repair_file(Path::new("chat.json"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ExportOutcome::Declined(PathBuf::from("repaired_chat.json")));
        assert_eq!(fs.text("repaired_chat.json").unwrap(), "keep");

        let (outcome, _) = ExportCoordinator::new(&fs, &AlwaysOverwrite)
            .repair_file(Path::new("chat.json"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ExportOutcome::Written(_)));
        assert_ne!(fs.text("repaired_chat.json").unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_repair_file_failure_writes_nothing() {
        let fs = MemoryFileSystem::new().with_file("chat.json", "no json here");
        let coordinator = ExportCoordinator::new(&fs, &AlwaysOverwrite);

        let err = coordinator
            .repair_file(Path::new("chat.json"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepairFailed);
        assert_eq!(fs.len(), 1);
    }
}
