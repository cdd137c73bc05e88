//! Command-line interface for chat-exporter.
//!
//! Provides scriptable access to the repair and export pipeline:
//! - `repair`: Write a repaired copy of a corrupted archive
//! - `csv`: Export sessions as CSV in one of four layouts
//! - `dataset`: Export sessions as a JSON dataset
//! - `interactive`: Step-by-step prompts for all of the above
//! - `config`: Show or create the configuration file

mod commands;
mod prompt;

pub use prompt::Prompter;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, OverwritePolicy};
use crate::error::{ExporterError, Result};

/// Repair and export chat-session archives.
#[derive(Debug, Parser)]
#[command(name = "chat-export")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress non-essential output.
    #[arg(short = 'q', long, global = true, env = "CHAT_EXPORT_QUIET")]
    pub quiet: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", env = "CHAT_EXPORT_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log format (text, json, compact, pretty).
    #[arg(long, global = true, default_value = "text", env = "CHAT_EXPORT_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to custom configuration file.
    #[arg(long, global = true, env = "CHAT_EXPORT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    #[default]
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// All of the above plus debug messages.
    Debug,
    /// All messages including trace-level details.
    Trace,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// Structured JSON format for machine consumption.
    Json,
    /// Compact single-line format.
    Compact,
    /// Pretty format with full details.
    Pretty,
}

impl LogLevel {
    /// Convert to tracing filter level.
    #[must_use]
    pub fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Repair a corrupted archive into `repaired_<name>` next to it.
    Repair(RepairArgs),

    /// Export sessions as CSV.
    Csv(CsvArgs),

    /// Export sessions as a JSON dataset.
    Dataset(DatasetArgs),

    /// Answer prompts instead of passing flags.
    #[command(alias = "i")]
    Interactive,

    /// Manage configuration.
    Config(ConfigArgs),
}

/// Arguments for the repair command.
#[derive(Debug, Args)]
pub struct RepairArgs {
    /// Archive to repair. It is never modified.
    pub input: PathBuf,

    /// File-name prefix for the repaired copy.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Print the repair report as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overwrite: OverwriteArgs,
}

/// Overwrite flags shared by the commands that write files.
#[derive(Debug, Clone, Copy, Args)]
pub struct OverwriteArgs {
    /// Replace existing files without asking.
    #[arg(long, conflicts_with = "no_clobber")]
    pub overwrite: bool,

    /// Never replace existing files.
    #[arg(long)]
    pub no_clobber: bool,
}

impl OverwriteArgs {
    /// Policy from flags, falling back to the configured one.
    #[must_use]
    pub fn policy(self, configured: OverwritePolicy) -> OverwritePolicy {
        if self.overwrite {
            OverwritePolicy::Always
        } else if self.no_clobber {
            OverwritePolicy::Never
        } else {
            configured
        }
    }
}

/// Arguments for the csv command.
#[derive(Debug, Args)]
pub struct CsvArgs {
    /// Archive to export.
    pub input: PathBuf,

    /// Layout: inline, per-line, separate-files, json-in-csv (or 1-4).
    #[arg(short, long)]
    pub layout: Option<String>,

    /// Output file (`.csv` is appended if missing). For separate files, the
    /// sessions file.
    #[arg(short = 'O', long)]
    pub output: PathBuf,

    /// Messages file for the separate-files layout.
    #[arg(long)]
    pub messages_out: Option<PathBuf>,

    /// Omit the header row.
    #[arg(long)]
    pub no_header: bool,

    /// Field delimiter.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Repair the archive in memory before loading.
    #[arg(long)]
    pub repair: bool,

    #[command(flatten)]
    pub overwrite: OverwriteArgs,
}

/// Arguments for the dataset command.
#[derive(Debug, Args)]
pub struct DatasetArgs {
    /// Archive to export.
    pub input: PathBuf,

    /// Output file (`.json` is appended if missing).
    #[arg(short = 'O', long)]
    pub output: PathBuf,

    /// Pretty-print the JSON.
    #[arg(long)]
    pub pretty: bool,

    /// One record per session instead of one per message.
    #[arg(long)]
    pub per_session: bool,

    /// Repair the archive in memory before loading.
    #[arg(long)]
    pub repair: bool,

    #[command(flatten)]
    pub overwrite: OverwriteArgs,
}

/// Arguments for the config command.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config action.
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration as TOML.
    Show,
    /// Print the configuration file path.
    Path,
    /// Write a default configuration file.
    Init {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Initialize tracing/logging based on CLI options.
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{
        fmt::{self, format::FmtSpan},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_filter_string()));

    let result = match cli.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
}

/// Load the configuration. An explicit `--config` must load; problems with
/// the default file only produce a warning.
fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Ok(Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable default configuration");
            Config::default()
        })),
    }
}

/// Cancel `token` on the first Ctrl+C; exit immediately on the second.
fn install_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);
    // `config init` creates the file, so it cannot require one.
    let config = match &cli.command {
        Commands::Config(ConfigArgs {
            action: ConfigAction::Init { .. },
        }) => Config::default(),
        _ => load_config(&cli)?,
    };

    // Worker threads keep the interrupt handler responsive while the main
    // thread runs synchronous formatting.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| ExporterError::io("start async runtime", e))?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        install_interrupt_handler(cancel.clone());

        match &cli.command {
            Commands::Repair(args) => commands::repair::run(&cli, &config, args, &cancel).await,
            Commands::Csv(args) => commands::csv::run(&cli, &config, args, &cancel).await,
            Commands::Dataset(args) => commands::dataset::run(&cli, &config, args, &cancel).await,
            Commands::Interactive => commands::interactive::run(&cli, &config, &cancel).await,
            Commands::Config(args) => commands::config::run(&cli, &config, args),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::CsvLayout;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_csv_args_parse_layout_by_number() {
        let cli = Cli::try_parse_from(["chat-export", "csv", "in.json", "--layout", "3", "-O", "s", "--messages-out", "m"])
            .unwrap();
        let Commands::Csv(args) = cli.command else {
            panic!("expected csv command");
        };
        let layout: CsvLayout = args.layout.as_deref().unwrap().parse().unwrap();
        assert_eq!(layout, CsvLayout::SeparateFiles);
        assert_eq!(args.messages_out, Some(PathBuf::from("m")));
    }

    #[test]
    fn test_unknown_layout_left_to_the_command() {
        let cli = Cli::try_parse_from(["chat-export", "csv", "in.json", "--layout", "sideways", "-O", "x"])
            .unwrap();
        let Commands::Csv(args) = cli.command else {
            panic!("expected csv command");
        };
        let err = args.layout.unwrap().parse::<CsvLayout>().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_codes::EXIT_USAGE_ERROR);
    }

    #[test]
    fn test_overwrite_flags_conflict() {
        let result = Cli::try_parse_from([
            "chat-export", "dataset", "in.json", "-O", "x", "--overwrite", "--no-clobber",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overwrite_policy_from_flags() {
        let flags = OverwriteArgs { overwrite: false, no_clobber: false };
        assert_eq!(flags.policy(OverwritePolicy::Never), OverwritePolicy::Never);

        let flags = OverwriteArgs { overwrite: true, no_clobber: false };
        assert_eq!(flags.policy(OverwritePolicy::Prompt), OverwritePolicy::Always);

        let flags = OverwriteArgs { overwrite: false, no_clobber: true };
        assert_eq!(flags.policy(OverwritePolicy::Always), OverwritePolicy::Never);
    }

    #[test]
    fn test_log_format_variants() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn test_log_level_to_filter() {
        assert_eq!(LogLevel::Error.to_filter_string(), "error");
        assert_eq!(LogLevel::Warn.to_filter_string(), "warn");
        assert_eq!(LogLevel::Info.to_filter_string(), "info");
        assert_eq!(LogLevel::Debug.to_filter_string(), "debug");
        assert_eq!(LogLevel::Trace.to_filter_string(), "trace");
    }
}
