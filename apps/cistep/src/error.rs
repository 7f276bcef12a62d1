//! CLI error handling

use std::fmt;

use cistep_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(cistep_errors::ConfigError),
    /// Step or backend error
    Step(cistep_errors::Error),
    /// The step ran but did not succeed
    StepFailed(cistep_types::StepResult),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => {
                write!(f, "Configuration error: {e}")?;
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                Ok(())
            }
            CliError::Step(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::StepFailed(result) => write!(f, "Step finished with result: {result}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Step(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::StepFailed(_) => None,
        }
    }
}

impl From<cistep_errors::ConfigError> for CliError {
    fn from(e: cistep_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<cistep_errors::Error> for CliError {
    fn from(e: cistep_errors::Error) -> Self {
        match e {
            cistep_errors::Error::Config(config) => CliError::Config(config),
            other => CliError::Step(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(std::io::Error::other(e))
    }
}
