//! Dataset command implementation.

use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, DatasetArgs, Prompter};
use crate::config::Config;
use crate::error::Result;
use crate::export::{DatasetGranularity, ExportRequest};
use crate::fs::RealFileSystem;

use super::{export_with_policy, load_archive, report_outcome};

/// Run the dataset command.
pub async fn run(
    cli: &Cli,
    config: &Config,
    args: &DatasetArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = ExportRequest::dataset(&args.output);
    request.destinations()?;

    let mut settings = config.export_settings()?;
    settings.dataset_pretty |= args.pretty;
    if args.per_session {
        settings.dataset_granularity = DatasetGranularity::Session;
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
