//! Typed command surfaces for each component kind, built on top of the
//! generic [`Proxy`]. Each wraps the numeric message codes in its class's
//! range behind a small, named API (spec §3: Tscope, Ifc, TestSig, Dx,
//! Archiver, Channelizer, ComponentControl).

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::model::activity_id::ActivityId;
use crate::transport::{Frame, MessageCode, MessageHeader};

use super::error::ComponentError;
use super::proxy::{ComponentLink, Proxy};

/// Builds a frame with an empty body tied to `activity_id`, for command
/// messages that carry no payload beyond their code.
fn bare_frame(code: u32, activity_id: ActivityId, message_number: u32) -> Frame {
    Frame {
        header: MessageHeader {
            code: MessageCode(code),
            data_length: 0,
            message_number,
            activity_id,
            timestamp: crate::transport::Timestamp::now(),
            sender: crate::transport::component_id(""),
            receiver: crate::transport::component_id(""),
        },
        body: Bytes::new(),
    }
}

/// Builds a frame carrying a little-endian f64 payload, used for tuning and
/// pointing commands.
fn f64_frame(code: u32, activity_id: ActivityId, message_number: u32, value: f64) -> Frame {
    let mut body = BytesMut::with_capacity(8);
    body.put_f64_le(value);
    Frame {
        header: MessageHeader {
            code: MessageCode(code),
            data_length: 8,
            message_number,
            activity_id,
            timestamp: crate::transport::Timestamp::now(),
            sender: crate::transport::component_id(""),
            receiver: crate::transport::component_id(""),
        },
        body: body.freeze(),
    }
}

macro_rules! component_command_codes {
    ($base:expr, $($name:ident = $offset:expr),+ $(,)?) => {
        $(pub const $name: u32 = $base + $offset;)+
    };
}

/// Telescope array controller command surface.
pub struct Tscope<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> Tscope<L> {
    component_command_codes!(MessageCode::TSCOPE_BASE,
        POINT = 1,
        FREE_ANTS = 2,
        PREPARE_ANTS = 3,
        AUTOSELECT_ANTS = 4,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn point(&self, activity_id: ActivityId, ra_rads: f64) -> Result<(), ComponentError> {
        self.proxy.send(f64_frame(Self::POINT, activity_id, 1, ra_rads)).await
    }

    pub async fn free_ants(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::FREE_ANTS, activity_id, 1)).await
    }

    pub async fn prepare_ants(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::PREPARE_ANTS, activity_id, 1)).await
    }
}

/// IF-chain signal conditioner command surface.
pub struct Ifc<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> Ifc<L> {
    component_command_codes!(MessageCode::IFC_BASE,
        SET_SKY_FREQ = 1,
        ATTENUATE = 2,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn set_sky_freq(&self, activity_id: ActivityId, sky_freq_mhz: f64) -> Result<(), ComponentError> {
        self.proxy.send(f64_frame(Self::SET_SKY_FREQ, activity_id, 1, sky_freq_mhz)).await
    }
}

/// Test-signal generator command surface.
pub struct TestSig<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> TestSig<L> {
    component_command_codes!(MessageCode::TEST_SIG_BASE,
        START = 1,
        STOP = 2,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn start(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::START, activity_id, 1)).await
    }

    pub async fn stop(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::STOP, activity_id, 1)).await
    }
}

/// Detector (DX) command surface.
pub struct Dx<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> Dx<L> {
    component_command_codes!(MessageCode::DX_BASE,
        SET_FREQ = 1,
        START_COLLECTION = 2,
        STOP_COLLECTION = 3,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn set_freq(&self, activity_id: ActivityId, sky_freq_mhz: f64) -> Result<(), ComponentError> {
        self.proxy.send(f64_frame(Self::SET_FREQ, activity_id, 1, sky_freq_mhz)).await
    }

    pub async fn start_collection(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::START_COLLECTION, activity_id, 1)).await
    }

    pub async fn stop_collection(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::STOP_COLLECTION, activity_id, 1)).await
    }
}

/// Archiver command surface.
pub struct Archiver<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> Archiver<L> {
    component_command_codes!(MessageCode::ARCHIVER_BASE,
        ARCHIVE_ACTIVITY = 1,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn archive_activity(&self, activity_id: ActivityId) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::ARCHIVE_ACTIVITY, activity_id, 1)).await
    }
}

/// Channelizer command surface.
pub struct Channelizer<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> Channelizer<L> {
    component_command_codes!(MessageCode::CHANNELIZER_BASE,
        ASSIGN_CHANNEL = 1,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn assign_channel(&self, activity_id: ActivityId, channel_number: u32) -> Result<(), ComponentError> {
        let mut body = BytesMut::with_capacity(4);
        body.put_u32(channel_number);
        let frame = Frame {
            header: MessageHeader {
                code: MessageCode(Self::ASSIGN_CHANNEL),
                data_length: 4,
                message_number: 1,
                activity_id,
                timestamp: crate::transport::Timestamp::now(),
                sender: crate::transport::component_id(""),
                receiver: crate::transport::component_id(""),
            },
            body: body.freeze(),
        };
        self.proxy.send(frame).await
    }
}

/// Facility-wide start/stop/reset control surface, distinct from any single
/// hardware kind (spec §3, "component-control").
pub struct ComponentControl<L: ComponentLink> {
    proxy: Arc<Proxy<L>>,
}

impl<L: ComponentLink> ComponentControl<L> {
    component_command_codes!(MessageCode::COMPONENT_CONTROL_BASE,
        RESET = 1,
        SHUTDOWN = 2,
    );

    pub fn new(proxy: Arc<Proxy<L>>) -> Self {
        Self { proxy }
    }

    pub async fn reset(&self) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::RESET, crate::model::NO_ACTIVITY_ID, 1)).await
    }

    pub async fn shutdown(&self) -> Result<(), ComponentError> {
        self.proxy.send(bare_frame(Self::SHUTDOWN, crate::model::NO_ACTIVITY_ID, 1)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::handshake::HandshakeState;
    use crate::proxy::proxy::tests::FakeLink;

    fn ready_proxy() -> Arc<Proxy<FakeLink>> {
        let proxy = Arc::new(Proxy::new("dx1", MessageCode::DX_BASE, Arc::new(FakeLink::new())));
        proxy.transition(HandshakeState::IntrinsicsPending).unwrap();
        proxy.accept_intrinsics("ok".to_string()).unwrap();
        proxy
    }

    #[tokio::test]
    async fn dx_set_freq_sends_expected_code() {
        let dx = Dx::new(ready_proxy());
        dx.set_freq(ActivityId::new(1), 1420.1).await.unwrap();
    }

    #[tokio::test]
    async fn tscope_point_sends_expected_code() {
        let tscope = Tscope::new(ready_proxy());
        tscope.point(ActivityId::new(1), 1.0).await.unwrap();
    }

    #[tokio::test]
    async fn component_control_codes_are_untied_to_an_activity() {
        let control = ComponentControl::new(ready_proxy());
        control.reset().await.unwrap();
    }

    #[test]
    fn command_codes_fall_within_their_class_range() {
        assert!(Dx::<FakeLink>::SET_FREQ >= MessageCode::DX_BASE && Dx::<FakeLink>::SET_FREQ < MessageCode::TEST_SIG_BASE);
        assert!(Tscope::<FakeLink>::POINT >= MessageCode::TSCOPE_BASE && Tscope::<FakeLink>::POINT < MessageCode::IFC_BASE);
    }
}
