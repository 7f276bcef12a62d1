#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for cistep
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/cistep/config.toml)
//! - Environment variables
//! - CLI flags
//!
//! It also parses the two TOML documents the CLI works on: a source step
//! definition and a build description.

pub mod build;
pub mod constants;
pub mod step;

pub use build::BuildDefinition;
pub use step::StepDefinition;

use cistep_errors::{ConfigError, Error};
use cistep_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub steps: StepDefaults,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

/// Defaults applied to every source step unless its definition overrides them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefaults {
    #[serde(default = "default_interrupt_grace_secs")]
    pub interrupt_grace_secs: u64,
    #[serde(default = "default_log_environ")]
    pub log_environ: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            interrupt_grace_secs: 10,
            log_environ: true,
        }
    }
}

impl StepDefaults {
    #[must_use]
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_interrupt_grace_secs() -> u64 {
    10
}

fn default_log_environ() -> bool {
    true
}

/// Read a TOML document, telling a missing file apart from one that cannot be read
async fn read_file(path: &Path) -> Result<String, Error> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
            path: path.display().to_string(),
        }
        .into()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::APP_DIR)
            .join(constants::CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = read_file(path).await?;

        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the contents are not valid configuration TOML.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    /// Merge overrides from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value that cannot be parsed.
    pub fn merge_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        if let Some(output) = lookup(constants::ENV_OUTPUT) {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: constants::ENV_OUTPUT.to_string(),
                        value: output,
                    }
                    .into())
                }
            };
        }

        if let Some(color) = lookup(constants::ENV_COLOR) {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: constants::ENV_COLOR.to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        if let Some(grace) = lookup(constants::ENV_INTERRUPT_GRACE) {
            self.steps.interrupt_grace_secs =
                grace.parse().map_err(|_| ConfigError::InvalidValue {
                    field: constants::ENV_INTERRUPT_GRACE.to_string(),
                    value: grace,
                })?;
        }

        if let Some(log_environ) = lookup(constants::ENV_LOG_ENVIRON) {
            self.steps.log_environ = match log_environ.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: constants::ENV_LOG_ENVIRON.to_string(),
                        value: log_environ,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Settings that are accepted but probably not what was meant
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.steps.interrupt_grace_secs == 0 {
            warnings.push(
                "steps.interrupt_grace_secs is 0; interrupted backends get no time to stop"
                    .to_string(),
            );
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.general.default_output, OutputFormat::Tty);
        assert_eq!(config.steps.interrupt_grace(), Duration::from_secs(10));
        assert!(config.steps.log_environ);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml_str("[steps]\ninterrupt_grace_secs = 3\n").unwrap();
        assert_eq!(config.steps.interrupt_grace_secs, 3);
        assert!(config.steps.log_environ);
        assert_eq!(config.general.color, ColorChoice::Auto);
    }

    #[test]
    fn env_overrides() {
        let mut config = Config::default();
        config
            .merge_vars(vars(&[
                ("CISTEP_OUTPUT", "json"),
                ("CISTEP_INTERRUPT_GRACE", "30"),
                ("CISTEP_LOG_ENVIRON", "no"),
            ]))
            .unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.steps.interrupt_grace_secs, 30);
        assert!(!config.steps.log_environ);
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let mut config = Config::default();
        let err = config
            .merge_vars(vars(&[("CISTEP_INTERRUPT_GRACE", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue { ref field, .. }) if field == "CISTEP_INTERRUPT_GRACE"
        ));
    }

    #[tokio::test]
    async fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general]\ncolor = \"never\"\n").unwrap();

        let config = Config::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(config.general.color, ColorChoice::Never);
    }

    #[test]
    fn zero_grace_is_flagged() {
        assert!(Config::default().warnings().is_empty());
        let config = Config::from_toml_str("[steps]\ninterrupt_grace_secs = 0\n").unwrap();
        assert_eq!(config.warnings().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Io { path: Some(ref path), .. } if path == dir.path()));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotFound { .. })));
    }
}
