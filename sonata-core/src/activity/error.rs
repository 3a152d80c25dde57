//! Strategy/activity-level error taxonomy (spec §7).
//!
//! Lower layers (the observe state machine, proxies, frequency planning)
//! raise their own specific error types; `ActivityError` is the unifying
//! classification a strategy uses to decide whether a failure is
//! surfaced, retried with survivors, or escalated to a strategy halt.

use thiserror::Error;

use crate::model::frequency::FrequencyError;
use crate::proxy::ComponentError;

use super::observe::ObserveActivityError;

/// The ten error kinds spec §7 requires the core to distinguish,
/// independent of any specific transport.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("missing component: {0}")]
    MissingComponent(String),

    #[error(transparent)]
    OutOfBandFrequency(#[from] FrequencyError),

    #[error("invalid target {target_id}: {reason}")]
    InvalidTarget { target_id: i64, reason: String },

    #[error("component disconnected: {component}")]
    ComponentDisconnect { component: String },

    #[error("watchdog timeout: {0}")]
    WatchdogTimeout(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("archive filesystem error: {0}")]
    FileIoError(String),

    #[error("proxy version mismatch: {0}")]
    VersionMismatch(String),

    #[error("internal invariant violated: {0}")]
    InternalAssert(String),
}

/// Classifies an [`ObserveActivityError`] into its `ActivityError` kind
/// rather than blanket-wrapping it, since the inner enum's variants map to
/// different spec §7 kinds (a broken transition is `InternalAssert`, a
/// component-sourced fault carries that component's own classification).
impl From<ObserveActivityError> for ActivityError {
    fn from(err: ObserveActivityError) -> Self {
        match &err {
            ObserveActivityError::InvalidTransition { .. } => ActivityError::InternalAssert(err.to_string()),
            ObserveActivityError::WatchdogTimeout { .. } => ActivityError::WatchdogTimeout(err.to_string()),
            ObserveActivityError::ComponentFault { source, .. } => match source {
                ComponentError::VersionMismatch { .. } => ActivityError::VersionMismatch(err.to_string()),
                _ => ActivityError::ComponentDisconnect { component: err.to_string() },
            },
        }
    }
}
