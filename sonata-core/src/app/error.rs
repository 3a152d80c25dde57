//! Top-level application error type.

use std::fmt;

use crate::followup::FollowupError;
use crate::model::activity_id::ActivityIdError;
use crate::model::components_tree::ComponentsTreeError;
use crate::persistence::StoreError;

/// Errors that can occur while assembling or running the application.
#[derive(Debug)]
pub enum AppError {
    /// The expected-components manifest could not be parsed.
    ComponentsTree(ComponentsTreeError),

    /// The follow-up successor map failed its closure check.
    Followup(FollowupError),

    /// A persistence operation failed during startup checks.
    Store(StoreError),

    /// The activity id counter could not be opened or read.
    ActivityIdCounter(ActivityIdError),

    /// A configuration value was missing or malformed.
    Config(String),

    /// The filesystem layout or logging setup could not be initialized.
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ComponentsTree(e) => write!(f, "expected components manifest error: {}", e),
            AppError::Followup(e) => write!(f, "follow-up successor map error: {}", e),
            AppError::Store(e) => write!(f, "persistence error: {}", e),
            AppError::ActivityIdCounter(e) => write!(f, "activity id counter error: {}", e),
            AppError::Config(msg) => write!(f, "configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::ComponentsTree(e) => Some(e),
            AppError::Followup(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::ActivityIdCounter(e) => Some(e),
            AppError::Config(_) => None,
            AppError::Io(_) => None,
        }
    }
}

impl From<ComponentsTreeError> for AppError {
    fn from(e: ComponentsTreeError) -> Self {
        AppError::ComponentsTree(e)
    }
}

impl From<FollowupError> for AppError {
    fn from(e: FollowupError) -> Self {
        AppError::Followup(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<ActivityIdError> for AppError {
    fn from(e: ActivityIdError) -> Self {
        AppError::ActivityIdCounter(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
