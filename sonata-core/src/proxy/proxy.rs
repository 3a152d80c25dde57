//! The `ComponentLink` abstraction and the generic `Proxy` that tracks one
//! component's handshake state and cached intrinsics/status (spec §3, C2).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;

use bytes::Bytes;

use super::error::ComponentError;
use super::handshake::HandshakeState;
use crate::transport::{component_id, Frame, MessageCode, MessageHeader, Timestamp};

/// Boxed future type for dyn-compatible async methods, so `ComponentLink`
/// implementations can be stored behind `Arc<dyn ComponentLink>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The wire-level operations a proxy needs from its transport, abstracted
/// so tests can substitute an in-memory fake instead of a real socket.
pub trait ComponentLink: Send + Sync {
    /// Sends a frame to the component.
    fn send(&self, frame: Frame) -> BoxFuture<'_, Result<(), ComponentError>>;

    /// Waits for and returns the next frame from the component.
    fn recv(&self) -> BoxFuture<'_, Result<Frame, ComponentError>>;

    /// The component's declared name, once known.
    fn peer_name(&self) -> Option<String>;
}

/// A snapshot of everything the scheduler and activities need to know about
/// one connected component.
#[derive(Clone, Debug, Default)]
pub struct ComponentStatus {
    pub intrinsics: Option<String>,
    pub last_status_text: Option<String>,
}

/// Tracks one component's handshake progress and caches its last reported
/// intrinsics and status, independent of which kind of component it is.
///
/// Generic over `L: ComponentLink` so production code plugs in a TCP-backed
/// link while tests plug in an in-memory fake.
pub struct Proxy<L: ComponentLink> {
    name: String,
    /// Base of this proxy's component class's ten-thousand-wide code range
    /// (spec §3), used to address the generic control verbs below without
    /// colliding with another class's codes.
    class_base: u32,
    link: Arc<L>,
    state: RwLock<HandshakeState>,
    status: RwLock<ComponentStatus>,
}

impl<L: ComponentLink> std::fmt::Debug for Proxy<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("name", &self.name)
            .field("class_base", &self.class_base)
            .field("state", &*self.state.read())
            .field("status", &*self.status.read())
            .finish()
    }
}

impl<L: ComponentLink> Proxy<L> {
    /// Creates a proxy in the `Connecting` state.
    pub fn new(name: impl Into<String>, class_base: u32, link: Arc<L>) -> Self {
        Self {
            name: name.into(),
            class_base,
            link,
            state: RwLock::new(HandshakeState::Connecting),
            status: RwLock::new(ComponentStatus::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.read()
    }

    /// Attempts to move the proxy to `next`, rejecting invalid transitions
    /// rather than corrupting the handshake's invariants.
    pub fn transition(&self, next: HandshakeState) -> Result<(), ComponentError> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(ComponentError::UnexpectedMessage {
                component: self.name.clone(),
                code: 0,
                state: state.to_string(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Records freshly received intrinsics and moves the proxy to `Ready`.
    pub fn accept_intrinsics(&self, intrinsics: String) -> Result<(), ComponentError> {
        self.transition(HandshakeState::Ready)?;
        self.status.write().intrinsics = Some(intrinsics);
        Ok(())
    }

    /// Like [`Self::accept_intrinsics`], but rejects a component whose
    /// reported version doesn't match what the manager expects, dropping
    /// it to `Disconnected` instead of `Ready` (spec §8, S6).
    pub fn accept_intrinsics_versioned(&self, expected_version: &str, intrinsics: String) -> Result<(), ComponentError> {
        let actual_version = intrinsics
            .split(';')
            .find_map(|field| field.strip_prefix("version="))
            .unwrap_or("");

        if actual_version != expected_version {
            self.detach();
            return Err(ComponentError::VersionMismatch {
                component: self.name.clone(),
                expected: expected_version.to_string(),
                actual: actual_version.to_string(),
            });
        }

        self.accept_intrinsics(intrinsics)
    }

    /// Records a status string most recently reported by the component.
    pub fn record_status(&self, status_text: String) {
        self.status.write().last_status_text = Some(status_text);
    }

    pub fn status(&self) -> ComponentStatus {
        self.status.read().clone()
    }

    /// Sends a frame to the component, failing fast if the handshake is not
    /// complete (spec §4.2: a proxy must not be commanded before `Ready`).
    pub async fn send(&self, frame: Frame) -> Result<(), ComponentError> {
        if !self.state().is_ready() {
            return Err(ComponentError::UnexpectedMessage {
                component: self.name.clone(),
                code: frame.header.code.0,
                state: self.state().to_string(),
            });
        }
        self.link.send(frame).await
    }

    fn control_frame(&self, offset: u32) -> Frame {
        Frame {
            header: MessageHeader::untied(
                MessageCode(self.class_base + offset),
                0,
                1,
                component_id("sse"),
                component_id(&self.name),
                Timestamp::now(),
            ),
            body: Bytes::new(),
        }
    }

    /// Asks the component to report its intrinsics, sent the moment the
    /// proxy moves to `IntrinsicsPending` (spec §4.2). Unlike [`Self::send`]
    /// this does not require `Ready`, since requesting intrinsics is how the
    /// component gets there.
    pub async fn request_intrinsics(&self) -> Result<(), ComponentError> {
        self.link.send(self.control_frame(MessageCode::CONTROL_REQUEST_INTRINSICS_OFFSET)).await
    }

    /// Every proxy's per-component control surface (spec §4.3): ask for a
    /// fresh status report.
    pub async fn request_status_update(&self) -> Result<(), ComponentError> {
        self.send(self.control_frame(MessageCode::CONTROL_REQUEST_STATUS_UPDATE_OFFSET)).await
    }

    /// Tells the component to stop whatever it is doing, the first step of
    /// the straggler-eviction sequence (spec §4.6.3, S3).
    pub async fn stop(&self) -> Result<(), ComponentError> {
        self.send(self.control_frame(MessageCode::CONTROL_STOP_OFFSET)).await
    }

    /// Every proxy's per-component control surface (spec §4.3): tell the
    /// component to shut down.
    pub async fn shutdown(&self) -> Result<(), ComponentError> {
        self.send(self.control_frame(MessageCode::CONTROL_SHUTDOWN_OFFSET)).await
    }

    /// Every proxy's per-component control surface (spec §4.3): tell the
    /// component to drop and re-establish its socket.
    pub async fn reset_socket(&self) -> Result<(), ComponentError> {
        self.send(self.control_frame(MessageCode::CONTROL_RESET_SOCKET_OFFSET)).await
    }

    /// Marks the connection as lost. Idempotent.
    pub fn detach(&self) {
        let mut state = self.state.write();
        if *state != HandshakeState::Disconnected {
            *state = HandshakeState::Disconnected;
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// In-memory fake transport for handshake and send/recv tests.
    pub struct FakeLink {
        pub sent: Mutex<Vec<Frame>>,
        pub to_recv: Mutex<Vec<Frame>>,
        pub name: Option<String>,
    }

    impl FakeLink {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                to_recv: Mutex::new(Vec::new()),
                name: None,
            }
        }
    }

    impl ComponentLink for FakeLink {
        fn send(&self, frame: Frame) -> BoxFuture<'_, Result<(), ComponentError>> {
            Box::pin(async move {
                self.sent.lock().await.push(frame);
                Ok(())
            })
        }

        fn recv(&self) -> BoxFuture<'_, Result<Frame, ComponentError>> {
            Box::pin(async move {
                self.to_recv.lock().await.pop().ok_or(ComponentError::ConnectionLost {
                    component: "fake".to_string(),
                })
            })
        }

        fn peer_name(&self) -> Option<String> {
            self.name.clone()
        }
    }

    fn sample_frame() -> Frame {
        Frame {
            header: MessageHeader {
                code: MessageCode(MessageCode::DX_BASE),
                data_length: 0,
                message_number: 1,
                activity_id: crate::model::NO_ACTIVITY_ID,
                timestamp: crate::transport::Timestamp::now(),
                sender: crate::transport::component_id("sse"),
                receiver: crate::transport::component_id("dx1"),
            },
            body: Bytes::new(),
        }
    }

    #[test]
    fn new_proxy_starts_connecting() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        assert_eq!(proxy.state(), HandshakeState::Connecting);
    }

    #[test]
    fn accept_intrinsics_moves_through_intrinsics_pending_to_ready() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.accept_intrinsics("band=L".to_string()).unwrap();
        assert_eq!(proxy.state(), HandshakeState::Ready);
        assert_eq!(proxy.status().intrinsics.as_deref(), Some("band=L"));
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        let err = proxy.transition(HandshakeState::Ready).unwrap_err();
        assert!(matches!(err, ComponentError::UnexpectedMessage { .. }));
    }

    #[tokio::test]
    async fn send_before_ready_is_rejected() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        let err = proxy.send(sample_frame()).await.unwrap_err();
        assert!(matches!(err, ComponentError::UnexpectedMessage { .. }));
    }

    #[tokio::test]
    async fn send_after_ready_reaches_the_link() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.accept_intrinsics("band=L".to_string()).unwrap();
        proxy.send(sample_frame()).await.unwrap();
    }

    #[test]
    fn version_mismatch_disconnects_the_proxy_instead_of_readying_it() {
        let proxy = Proxy::new("dx2", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        let err = proxy
            .accept_intrinsics_versioned("3.2", "version=3.1;band=L".to_string())
            .unwrap_err();
        assert!(matches!(err, ComponentError::VersionMismatch { .. }));
        assert_eq!(proxy.state(), HandshakeState::Disconnected);
    }

    #[test]
    fn matching_version_proceeds_to_ready() {
        let proxy = Proxy::new("dx2", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.accept_intrinsics_versioned("3.2", "version=3.2;band=L".to_string()).unwrap();
        assert_eq!(proxy.state(), HandshakeState::Ready);
    }

    #[test]
    fn detach_is_idempotent() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.detach();
        proxy.detach();
        assert_eq!(proxy.state(), HandshakeState::Disconnected);
    }

    #[tokio::test]
    async fn request_intrinsics_reaches_the_link_before_ready() {
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new()));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.request_intrinsics().await.unwrap();
    }

    #[tokio::test]
    async fn control_verbs_use_codes_within_their_class_range() {
        let link = Arc::new(FakeLink::new());
        let proxy = Proxy::new("dx1", MessageCode::DX_BASE, link.clone());
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.accept_intrinsics("ok".to_string()).unwrap();
        proxy.shutdown().await.unwrap();
        proxy.reset_socket().await.unwrap();
        proxy.stop().await.unwrap();
        proxy.request_status_update().await.unwrap();
        let sent = link.sent.lock().await;
        assert_eq!(sent.len(), 4);
        for frame in sent.iter() {
            assert!(frame.header.code.0 >= MessageCode::DX_BASE && frame.header.code.0 < MessageCode::TEST_SIG_BASE);
        }
    }
}
