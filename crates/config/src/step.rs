//! Source step definitions as written in TOML
//!
//! ```toml
//! backend = "dry-run"
//! codebase = "lib"
//! branch = "main"
//! mode = "full"
//! method = "fresh"
//! description = ["git", "pull"]
//! ```

use crate::{read_file, StepDefaults};
use cistep_errors::{ConfigError, Error};
use cistep_types::Words;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Static configuration for one source step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    /// Checkout backend the step delegates to
    #[serde(default)]
    pub backend: Option<String>,
    /// Base name override; the backend name is used otherwise
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub codebase: String,
    #[serde(default)]
    pub always_use_latest: bool,
    /// Step default branch used by the latest policy and as stamp fallback
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub description: Option<Words>,
    #[serde(default)]
    pub description_done: Option<Words>,
    #[serde(default)]
    pub description_suffix: Option<Words>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub interrupt_grace_secs: Option<u64>,
    #[serde(default)]
    pub log_environ: Option<bool>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl StepDefinition {
    /// Load a step definition from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = read_file(path).await?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a step definition
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed (including a description of
    /// the wrong type) or if validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let definition: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check constraints serde cannot express
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        match self.backend.as_deref() {
            None => {
                return Err(ConfigError::MissingField {
                    field: "backend".to_string(),
                }
                .into())
            }
            Some(backend) if backend.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "backend".to_string(),
                    value: backend.to_string(),
                }
                .into())
            }
            Some(_) => {}
        }

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "name".to_string(),
                    value: name.clone(),
                }
                .into());
            }
        }

        for (field, words) in [
            ("description", &self.description),
            ("description_done", &self.description_done),
        ] {
            if words.as_ref().is_some_and(Words::is_empty) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "[]".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Backend name; only valid after [`validate`](Self::validate) succeeded
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.as_deref().unwrap_or_default()
    }

    /// Grace period after an interrupt, falling back to the global default
    #[must_use]
    pub fn interrupt_grace(&self, defaults: &StepDefaults) -> Duration {
        self.interrupt_grace_secs
            .map_or_else(|| defaults.interrupt_grace(), Duration::from_secs)
    }

    #[must_use]
    pub fn log_environ(&self, defaults: &StepDefaults) -> bool {
        self.log_environ.unwrap_or(defaults.log_environ)
    }
}
