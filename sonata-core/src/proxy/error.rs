//! Component error classification (spec §3, §4.2).

use thiserror::Error;

/// Severity a component-reported error is classified at. The scheduler and
/// activity state machines use this to decide whether to retry, abandon the
/// current activity, or halt entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// An error surfaced by a component connection or its handshake.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{component}: connection lost")]
    ConnectionLost { component: String },

    #[error("{component}: handshake timed out waiting for intrinsics")]
    HandshakeTimeout { component: String },

    #[error("{component}: unexpected message code {code} in state {state}")]
    UnexpectedMessage {
        component: String,
        code: u32,
        state: String,
    },

    #[error("{component}: reported error (severity={severity:?}): {detail}")]
    Reported {
        component: String,
        severity: Severity,
        detail: String,
    },

    #[error("{component}: intrinsics version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        component: String,
        expected: String,
        actual: String,
    },

    #[error("{component}: framing error: {source}")]
    Framing {
        component: String,
        #[source]
        source: crate::transport::FrameError,
    },

    #[error("{component}: transport I/O error: {source}")]
    Io {
        component: String,
        #[source]
        source: std::io::Error,
    },
}

impl ComponentError {
    /// The severity this error should be classified at for dispatch to the
    /// activity/strategy error handlers.
    pub fn severity(&self) -> Severity {
        match self {
            ComponentError::ConnectionLost { .. } => Severity::Error,
            ComponentError::HandshakeTimeout { .. } => Severity::Error,
            ComponentError::UnexpectedMessage { .. } => Severity::Warning,
            ComponentError::Reported { severity, .. } => *severity,
            ComponentError::VersionMismatch { .. } => Severity::Error,
            ComponentError::Framing { .. } => Severity::Error,
            ComponentError::Io { .. } => Severity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_fatal() {
        let err = ComponentError::Io {
            component: "dx1".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke"),
        };
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn reported_error_keeps_its_own_severity() {
        let err = ComponentError::Reported {
            component: "tscope".to_string(),
            severity: Severity::Info,
            detail: "antenna drive recalibrated".to_string(),
        };
        assert_eq!(err.severity(), Severity::Info);
    }

    #[test]
    fn version_mismatch_is_an_error() {
        let err = ComponentError::VersionMismatch {
            component: "dx2".to_string(),
            expected: "3.2".to_string(),
            actual: "3.1".to_string(),
        };
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn unexpected_message_is_a_warning() {
        let err = ComponentError::UnexpectedMessage {
            component: "ifc1".to_string(),
            code: 99,
            state: "ready".to_string(),
        };
        assert_eq!(err.severity(), Severity::Warning);
    }
}
