//! Configuration management for chat-exporter.
//!
//! Handles:
//! - CSV defaults (layout, delimiter, header, line ending)
//! - Dataset defaults (pretty printing, record granularity)
//! - Output policy (file permissions, overwrite behavior, repaired-file prefix)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, Result};
use crate::export::{CsvLayout, DatasetGranularity, ExportSettings, LineEnding};
use crate::util::atomic_write;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// CSV output defaults.
    #[serde(default)]
    pub csv: CsvConfig,
    /// Dataset output defaults.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// File output policy.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        let config_path = default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExporterError::io_at("read config file", path.to_path_buf(), e))?;

        let config: Self = toml::from_str(&content).map_err(|e| ExporterError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// Uses atomic file writes so a failed save never leaves a truncated
    /// config behind.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.to_toml()?.as_bytes(), None)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ExporterError::InvalidConfig {
            message: format!("Failed to serialize config: {e}"),
        })
    }

    /// Reject values the exporters cannot honor.
    pub fn validate(&self) -> Result<()> {
        let delimiter = self.csv.delimiter;
        if matches!(delimiter, '"' | '\r' | '\n') {
            return Err(ExporterError::InvalidConfig {
                message: format!("csv.delimiter cannot be {delimiter:?}"),
            });
        }

        self.output.permission_bits()?;

        let prefix = &self.output.repair_prefix;
        if prefix.is_empty() || prefix.contains(['/', '\\']) {
            return Err(ExporterError::InvalidConfig {
                message: format!(
                    "output.repair_prefix must be a non-empty file-name prefix, got {prefix:?}"
                ),
            });
        }
        Ok(())
    }

    /// Formatter and write settings derived from this configuration.
    pub fn export_settings(&self) -> Result<ExportSettings> {
        Ok(ExportSettings {
            csv_header: self.csv.header,
            csv_delimiter: self.csv.delimiter,
            line_ending: self.csv.line_ending.unwrap_or_default(),
            dataset_pretty: self.dataset.pretty,
            dataset_granularity: self.dataset.granularity,
            permissions: self.output.permission_bits()?,
            repair_prefix: self.output.repair_prefix.clone(),
        })
    }
}

/// CSV configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Layout used when none is given on the command line.
    #[serde(default)]
    pub layout: CsvLayout,
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Write a header row.
    #[serde(default = "default_true")]
    pub header: bool,
    /// `lf` or `crlf`; platform convention when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<LineEnding>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            layout: CsvLayout::default(),
            delimiter: default_delimiter(),
            header: true,
            line_ending: None,
        }
    }
}

/// Dataset configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Pretty-print JSON.
    #[serde(default)]
    pub pretty: bool,
    /// `message` or `session` records.
    #[serde(default)]
    pub granularity: DatasetGranularity,
}

/// What to do when a destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Ask on the terminal.
    #[default]
    Prompt,
    /// Replace silently.
    Always,
    /// Never replace; the export is declined.
    Never,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Octal permission bits for written files, e.g. `"644"`.
    #[serde(default = "default_permissions")]
    pub permissions: String,
    /// Overwrite policy.
    #[serde(default)]
    pub overwrite: OverwritePolicy,
    /// File-name prefix for repaired archives.
    #[serde(default = "default_repair_prefix")]
    pub repair_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            permissions: default_permissions(),
            overwrite: OverwritePolicy::default(),
            repair_prefix: default_repair_prefix(),
        }
    }
}

impl OutputConfig {
    /// Parsed permission bits.
    pub fn permission_bits(&self) -> Result<u32> {
        let digits = self.permissions.trim().trim_start_matches("0o");
        u32::from_str_radix(digits, 8)
            .ok()
            .filter(|bits| *bits <= 0o777)
            .ok_or_else(|| ExporterError::InvalidConfig {
                message: format!(
                    "output.permissions must be octal mode bits like \"644\", got {:?}",
                    self.permissions
                ),
            })
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_permissions() -> String {
    "644".to_string()
}

fn default_repair_prefix() -> String {
    "repaired_".to_string()
}

/// Get the default configuration path.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| ExporterError::InvalidConfig {
        message: "could not determine the user configuration directory".to_string(),
    })?;

    Ok(config_dir.join("chat-exporter").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.csv.layout, CsvLayout::Inline);
        assert_eq!(config.csv.delimiter, ',');
        assert_eq!(config.output.overwrite, OverwritePolicy::Prompt);
        assert_eq!(config.output.permission_bits().unwrap(), 0o644);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[csv]
layout = "separate-files"
line_ending = "crlf"

[output]
overwrite = "never"
"#,
        )
        .unwrap();

        assert_eq!(parsed.csv.layout, CsvLayout::SeparateFiles);
        assert_eq!(parsed.csv.line_ending, Some(LineEnding::Crlf));
        assert!(parsed.csv.header);
        assert_eq!(parsed.output.overwrite, OverwritePolicy::Never);
        assert_eq!(parsed.output.repair_prefix, "repaired_");
    }

    #[test]
    fn test_export_settings() {
        let mut config = Config::default();
        config.csv.delimiter = ';';
        config.dataset.granularity = DatasetGranularity::Session;
        config.output.permissions = "0o600".to_string();

        let settings = config.export_settings().unwrap();
        assert_eq!(settings.csv_delimiter, ';');
        assert_eq!(settings.dataset_granularity, DatasetGranularity::Session);
        assert_eq!(settings.permissions, 0o600);
        assert_eq!(settings.line_ending, LineEnding::platform());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.output.permissions = "rw-r--r--".to_string();
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Internal);

        let mut config = Config::default();
        config.output.permissions = "1777".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.csv.delimiter = '"';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.repair_prefix = "../".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.dataset.pretty = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[csv]\nlayout = \"sideways\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ExporterError::InvalidConfig { .. }));
    }
}
