//! Repair command implementation.
//!
//! Writes `<prefix><file name>` next to the input and reports what changed.

use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Prompter, RepairArgs};
use crate::config::Config;
use crate::error::Result;
use crate::export::ExportOutcome;
use crate::fs::RealFileSystem;

use super::repair_with_policy;

/// Run the repair command.
pub async fn run(cli: &Cli, config: &Config, args: &RepairArgs, cancel: &CancellationToken) -> Result<()> {
    let mut config = config.clone();
    if let Some(prefix) = &args.prefix {
        config.output.repair_prefix.clone_from(prefix);
        config.validate()?;
    }

    let (outcome, repaired) = repair_with_policy(
        &RealFileSystem,
        args.overwrite.policy(config.output.overwrite),
        &Prompter::stdio(cancel.clone()),
        config.export_settings()?,
        &args.input,
        cancel,
    )
    .await?;

    let (path, written) = match &outcome {
        ExportOutcome::Written(paths) => (paths.first().cloned().unwrap_or_default(), true),
        ExportOutcome::Declined(path) => (path.clone(), false),
    };

    if args.json {
        let report = serde_json::json!({
            "output": path,
            "written": written,
            "sessions": repaired.sessions,
            "actions": repaired.report.actions,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !written {
        println!("Not overwriting {}; nothing was written.", path.display());
    } else if !cli.quiet {
        println!("Repaired JSON data has been saved to: {}", path.display());
        println!("Sessions: {}", repaired.sessions);
        println!("Fixes: {}", repaired.report);
    }

    Ok(())
}
