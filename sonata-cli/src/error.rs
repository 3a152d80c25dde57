//! Top-level CLI error type.

use std::fmt;

use sonata_core::app::AppError;

/// Errors the CLI can report to a user.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or was invalid.
    Config(String),

    /// Application bootstrap failed.
    App(AppError),

    /// A filesystem operation (reading the status snapshot, writing a
    /// stop marker) failed.
    Io(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "configuration error: {}", msg),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}
