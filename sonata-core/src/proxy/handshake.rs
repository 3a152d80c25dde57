//! Proxy handshake state machine (spec §3, §4.2).
//!
//! Every component connection moves through the same four states on its
//! way to being usable by the scheduler, independent of which kind of
//! component it is.

use std::fmt;

/// Where a component connection is in its handshake with the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// TCP connection accepted, component has not yet identified itself.
    Connecting,
    /// Component identified itself; waiting for its intrinsics message.
    IntrinsicsPending,
    /// Intrinsics received and cached; the component can be commanded.
    Ready,
    /// The connection has been lost or was never established.
    Disconnected,
}

impl HandshakeState {
    /// True once commands may be sent to the component.
    pub fn is_ready(self) -> bool {
        matches!(self, HandshakeState::Ready)
    }

    /// Valid forward transitions, per spec §4.2. Any other target is a bug
    /// in the caller and is rejected rather than silently accepted.
    pub fn can_transition_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        matches!(
            (self, next),
            (Connecting, IntrinsicsPending)
                | (Connecting, Disconnected)
                | (IntrinsicsPending, Ready)
                | (IntrinsicsPending, Disconnected)
                | (Ready, Disconnected)
                | (Disconnected, Connecting)
        )
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandshakeState::Connecting => "connecting",
            HandshakeState::IntrinsicsPending => "intrinsics-pending",
            HandshakeState::Ready => "ready",
            HandshakeState::Disconnected => "disconnected",
        };
        write!(f, "{}", label)
    }
}
