//! Interactive command implementation.
//!
//! Walks the user through input path, optional repair, output kind, CSV
//! layout and file names. Every prompt can be interrupted with Ctrl+C or
//! end of input, which ends the session cleanly.

use std::fmt::Write as _;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Prompter};
use crate::config::Config;
use crate::error::{ExporterError, Result};
use crate::export::{CsvLayout, ExportOutcome, ExportRequest, OutputKind};
use crate::fs::RealFileSystem;

use super::{export_with_policy, load_archive, repair_with_policy, report_outcome};

const PROMPT_INPUT_PATH: &str = "Enter the path to the JSON file: ";
const PROMPT_REPAIR: &str = "Do you want to repair data? (yes/no): ";
const PROMPT_SAVE_DATASET: &str = "Do you want to save the output to a file? (yes/no): ";

/// Run the interactive command.
pub async fn run(cli: &Cli, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let prompter = Prompter::stdio(cancel.clone());
    let settings = config.export_settings()?;
    let fs = RealFileSystem;

    let input = prompter.ask_parsed(PROMPT_INPUT_PATH, |answer| non_empty("input path", answer)).await?;

    if prompter.confirm(PROMPT_REPAIR).await? {
        let (outcome, repaired) =
            repair_with_policy(&fs, config.output.overwrite, &prompter, settings, &input, cancel).await?;
        if let ExportOutcome::Written(paths) = &outcome {
            for path in paths {
                prompter.say(&format!("Repaired JSON data has been saved to: {}", path.display()))?;
            }
            prompter.say(&format!("Fixes: {}", repaired.report))?;
        } else {
            report_outcome(cli, &outcome);
        }
        return Ok(());
    }

    let archive = load_archive(cli, &fs, &input, false)?;
    prompter.say(&format!(
        "Loaded {} sessions with {} messages.",
        archive.sessions().len(),
        archive.message_count()
    ))?;

    let kind: OutputKind = prompter
        .ask_parsed(&menu("Select the output format:", OutputKind::ALL.iter().map(OutputKind::label)), str::parse)
        .await?;

    let request = match kind {
        OutputKind::Csv => {
            let layout: CsvLayout = prompter
                .ask_parsed(
                    &menu("Select the message output format:", CsvLayout::ALL.iter().map(CsvLayout::label)),
                    str::parse,
                )
                .await?;
            if layout.is_separate() {
                let sessions = ask_file_name(&prompter, "Enter the name of the sessions CSV file to save: ").await?;
                let messages = ask_file_name(&prompter, "Enter the name of the messages CSV file to save: ").await?;
                ExportRequest::separate_csv(sessions, messages)
            } else {
                ExportRequest::csv(layout, ask_file_name(&prompter, "Enter the name of the CSV file to save: ").await?)
            }
        }
        OutputKind::Dataset => {
            if !prompter.confirm(PROMPT_SAVE_DATASET).await? {
                prompter.say("Save to file operation canceled.")?;
                return Ok(());
            }
            ExportRequest::dataset(ask_file_name(&prompter, "Enter the name of the dataset file to save: ").await?)
        }
    };

    let outcome = export_with_policy(
        &fs,
        config.output.overwrite,
        &prompter,
        settings,
        &request,
        archive.sessions(),
        cancel,
    )
    .await?;

    report_outcome(cli, &outcome);
    Ok(())
}

async fn ask_file_name(prompter: &Prompter, question: &str) -> Result<PathBuf> {
    prompter.ask_parsed(question, |answer| non_empty("file name", answer)).await
}

fn non_empty(what: &'static str, answer: &str) -> Result<PathBuf> {
    if answer.is_empty() {
        Err(ExporterError::selection(what, "(empty)"))
    } else {
        Ok(PathBuf::from(answer))
    }
}

/// Numbered menu text, one option per line.
fn menu<'a>(title: &str, labels: impl Iterator<Item = &'a str>) -> String {
    let mut text = format!("{title}\n");
    for (number, label) in labels.enumerate() {
        let _ = writeln!(text, "{}) {label}", number + 1);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_numbers_match_selectors() {
        let text = menu("Pick:", CsvLayout::ALL.iter().map(CsvLayout::label));
        assert!(text.starts_with("Pick:\n1) Inline formatting\n"));
        assert!(text.contains("3) Separate files for sessions and messages\n"));
        assert_eq!("3".parse::<CsvLayout>().unwrap(), CsvLayout::SeparateFiles);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("file name", "out").unwrap(), PathBuf::from("out"));
        assert!(non_empty("file name", "").is_err());
    }
}
