//! CSV command implementation.

use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, CsvArgs, Prompter};
use crate::config::Config;
use crate::error::{ExporterError, Result};
use crate::export::{check_delimiter, CsvLayout, ExportRequest};
use crate::fs::RealFileSystem;

use super::{export_with_policy, load_archive, report_outcome};

/// Run the csv command.
pub async fn run(cli: &Cli, config: &Config, args: &CsvArgs, cancel: &CancellationToken) -> Result<()> {
    let layout: CsvLayout = match &args.layout {
        Some(name) => name.parse()?,
        None => config.csv.layout,
    };

    let request = if layout.is_separate() {
        let messages = args.messages_out.as_ref().ok_or_else(|| {
            ExporterError::selection(
                "messages destination",
                "none (the separate-files layout needs --messages-out)",
            )
        })?;
        ExportRequest::separate_csv(&args.output, messages)
    } else {
        ExportRequest::csv(layout, &args.output)
    };
    request.destinations()?;

    let mut settings = config.export_settings()?;
    if args.no_header {
        settings.csv_header = false;
    }
    if let Some(delimiter) = args.delimiter {
        check_delimiter(delimiter)?;
        settings.csv_delimiter = delimiter;
    }

    let fs = RealFileSystem;
    let archive = load_archive(cli, &fs, &args.input, args.repair)?;

    let outcome = export_with_policy(
        &fs,
        args.overwrite.policy(config.output.overwrite),
        &Prompter::stdio(cancel.clone()),
        settings,
        &request,
        archive.sessions(),
        cancel,
    )
    .await?;

    report_outcome(cli, &outcome);
    Ok(())
}
