//! CLI command implementations.
//!
//! Each command is implemented in its own module with a `run` function
//! that handles the command logic.

pub mod config;
pub mod csv;
pub mod dataset;
pub mod interactive;
pub mod repair;

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{Cli, Prompter};
use crate::config::OverwritePolicy;
use crate::error::Result;
use crate::export::{
    AlwaysOverwrite, ExportCoordinator, ExportOutcome, ExportRequest, ExportSettings, NeverOverwrite,
};
use crate::fs::FileSystem;
use crate::model::{Archive, Session};
use crate::parser::StoreLoader;
use crate::repair::{RepairEngine, Repaired};

/// Load an archive, optionally repairing it in memory first.
pub fn load_archive(cli: &Cli, fs: &dyn FileSystem, path: &Path, repair: bool) -> Result<Archive> {
    let mut bytes = fs.read_file(path)?;

    if repair {
        let repaired = RepairEngine::new().repair(&bytes)?;
        if !cli.quiet && !repaired.report.is_clean() {
            eprintln!("Repaired in memory: {}", repaired.report);
        }
        bytes = repaired.bytes;
    }

    let mut loader = StoreLoader::new();
    let archive = loader.load_bytes(&bytes)?;
    let stats = loader.stats();
    info!(
        path = %path.display(),
        sessions = stats.sessions,
        messages = stats.messages,
        "Archive loaded"
    );
    Ok(archive)
}

/// Run an export, confirming overwrites according to `policy`.
pub async fn export_with_policy(
    fs: &dyn FileSystem,
    policy: OverwritePolicy,
    prompter: &Prompter,
    settings: ExportSettings,
    request: &ExportRequest,
    sessions: &[Session],
    cancel: &CancellationToken,
) -> Result<ExportOutcome> {
    match policy {
        OverwritePolicy::Always => {
            ExportCoordinator::new(fs, &AlwaysOverwrite)
                .with_settings(settings)
                .export(request, sessions, cancel)
                .await
        }
        OverwritePolicy::Never => {
            ExportCoordinator::new(fs, &NeverOverwrite)
                .with_settings(settings)
                .export(request, sessions, cancel)
                .await
        }
        OverwritePolicy::Prompt => {
            ExportCoordinator::new(fs, prompter)
                .with_settings(settings)
                .export(request, sessions, cancel)
                .await
        }
    }
}

/// Repair `input` into a prefixed copy, confirming an overwrite according
/// to `policy`.
pub async fn repair_with_policy(
    fs: &dyn FileSystem,
    policy: OverwritePolicy,
    prompter: &Prompter,
    settings: ExportSettings,
    input: &Path,
    cancel: &CancellationToken,
) -> Result<(ExportOutcome, Repaired)> {
    match policy {
        OverwritePolicy::Always => {
            ExportCoordinator::new(fs, &AlwaysOverwrite)
                .with_settings(settings)
                .repair_file(input, cancel)
                .await
        }
        OverwritePolicy::Never => {
            ExportCoordinator::new(fs, &NeverOverwrite)
                .with_settings(settings)
                .repair_file(input, cancel)
                .await
        }
        OverwritePolicy::Prompt => {
            ExportCoordinator::new(fs, prompter)
                .with_settings(settings)
                .repair_file(input, cancel)
                .await
        }
    }
}

/// Print what an export did.
pub fn report_outcome(cli: &Cli, outcome: &ExportOutcome) {
    match outcome {
        ExportOutcome::Written(paths) => {
            if !cli.quiet {
                for path in paths {
                    println!("Saved {}", path.display());
                }
            }
        }
        ExportOutcome::Declined(path) => {
            println!("Not overwriting {}; nothing was written.", path.display());
        }
    }
}
