//! Wire message header and marshal/demarshal (spec §3, "MessageHeader").
//!
//! Every message a proxy exchanges with a component carries a fixed-size
//! header followed by a body whose layout is determined by `code`. The
//! header alone is enough to route, log, and correlate a message with its
//! activity without deserializing the body.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::model::activity_id::{ActivityId, NO_ACTIVITY_ID};

/// Size of a `sender`/`receiver` component ID field, in bytes.
pub const COMPONENT_ID_LEN: usize = 16;

/// A fixed 16-byte component identifier, zero-padded on the right.
pub type ComponentId = [u8; COMPONENT_ID_LEN];

/// Packs `name` into a [`ComponentId`], truncating past 16 bytes.
pub fn component_id(name: &str) -> ComponentId {
    let mut id = [0u8; COMPONENT_ID_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(COMPONENT_ID_LEN);
    id[..n].copy_from_slice(&bytes[..n]);
    id
}

/// Size of the marshaled header, in bytes: four `u32`/`i32` fields (16),
/// the `Timestamp` pair (8), and two 16-byte component IDs (32).
pub const HEADER_LEN: usize = 4 * 4 + 8 + 2 * COMPONENT_ID_LEN;

/// Errors raised while marshaling or demarshaling a [`MessageHeader`].
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("declared data length {0} exceeds the maximum frame size")]
    DataTooLarge(u32),

    #[error("io error: {0:?}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err.kind())
    }
}

/// Maximum body size the framing layer will accept from the wire, guarding
/// against a corrupt length field causing an unbounded allocation.
pub const MAX_DATA_LEN: u32 = 64 * 1024 * 1024;

/// Identifies which component class and verb a message carries.
///
/// Per spec §3 each component class owns a disjoint ten-thousand-wide code
/// range, so a bare numeric code is enough to tell which proxy a message
/// belongs to without a discriminant byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageCode(pub u32);

impl MessageCode {
    pub const TSCOPE_BASE: u32 = 10_000;
    pub const IFC_BASE: u32 = 20_000;
    pub const DX_BASE: u32 = 30_000;
    pub const TEST_SIG_BASE: u32 = 40_000;
    pub const CHANNELIZER_BASE: u32 = 50_000;
    pub const ARCHIVER_BASE: u32 = 60_000;
    pub const COMPONENT_CONTROL_BASE: u32 = 70_000;
    pub const SCHEDULER_BASE: u32 = 80_000;

    /// Offsets reserved at the top of every component class's range for the
    /// generic per-proxy control verbs every component answers to,
    /// regardless of kind (spec §4.2, §4.3).
    pub const CONTROL_REQUEST_INTRINSICS_OFFSET: u32 = 9_990;
    pub const CONTROL_REQUEST_STATUS_UPDATE_OFFSET: u32 = 9_991;
    pub const CONTROL_STOP_OFFSET: u32 = 9_992;
    pub const CONTROL_SHUTDOWN_OFFSET: u32 = 9_993;
    pub const CONTROL_RESET_SOCKET_OFFSET: u32 = 9_994;

    /// The component class this code's range belongs to, if recognized.
    pub fn component_class(self) -> Option<&'static str> {
        match self.0 {
            n if (Self::TSCOPE_BASE..Self::IFC_BASE).contains(&n) => Some("tscope"),
            n if (Self::IFC_BASE..Self::DX_BASE).contains(&n) => Some("ifc"),
            n if (Self::DX_BASE..Self::TEST_SIG_BASE).contains(&n) => Some("dx"),
            n if (Self::TEST_SIG_BASE..Self::CHANNELIZER_BASE).contains(&n) => Some("testsig"),
            n if (Self::CHANNELIZER_BASE..Self::ARCHIVER_BASE).contains(&n) => Some("channelizer"),
            n if (Self::ARCHIVER_BASE..Self::COMPONENT_CONTROL_BASE).contains(&n) => Some("archiver"),
            n if (Self::COMPONENT_CONTROL_BASE..Self::SCHEDULER_BASE).contains(&n) => Some("component-control"),
            n if n >= Self::SCHEDULER_BASE => Some("scheduler"),
            _ => None,
        }
    }
}

/// Wire timestamp: whole seconds since the Unix epoch plus a microsecond
/// remainder, matching the two-field `NssDate`-style representation the
/// rest of the facility's components speak (spec §4.1).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub sec: u32,
    pub usec: u32,
}

impl Timestamp {
    /// Captures the current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            sec: since_epoch.as_secs() as u32,
            usec: since_epoch.subsec_micros(),
        }
    }
}

/// The fixed header prefixing every message on a component connection.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageHeader {
    pub code: MessageCode,
    pub data_length: u32,
    pub message_number: u32,
    pub activity_id: ActivityId,
    pub timestamp: Timestamp,
    pub sender: ComponentId,
    pub receiver: ComponentId,
}

impl MessageHeader {
    /// Builds a header with no activity association, for handshake and
    /// status traffic.
    pub fn untied(code: MessageCode, data_length: u32, message_number: u32, sender: ComponentId, receiver: ComponentId, timestamp: Timestamp) -> Self {
        Self {
            code,
            data_length,
            message_number,
            activity_id: NO_ACTIVITY_ID,
            timestamp,
            sender,
            receiver,
        }
    }

    /// Serializes this header into `out`, in network byte order.
    pub fn marshal(&self, out: &mut BytesMut) {
        out.put_u32(self.code.0);
        out.put_u32(self.data_length);
        out.put_u32(self.message_number);
        out.put_i32(self.activity_id.value());
        out.put_u32(self.timestamp.sec);
        out.put_u32(self.timestamp.usec);
        out.put_slice(&self.sender);
        out.put_slice(&self.receiver);
    }

    /// Parses a header from the front of `buf`, without consuming trailing
    /// body bytes.
    pub fn demarshal(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::TooShort {
                need: HEADER_LEN,
                have: buf.len(),
            });
        }
        let mut cursor = Bytes::copy_from_slice(&buf[..HEADER_LEN]);
        let code = MessageCode(cursor.get_u32());
        let data_length = cursor.get_u32();
        if data_length > MAX_DATA_LEN {
            return Err(FrameError::DataTooLarge(data_length));
        }
        let message_number = cursor.get_u32();
        let activity_id = ActivityId::new(cursor.get_i32());
        let timestamp = Timestamp {
            sec: cursor.get_u32(),
            usec: cursor.get_u32(),
        };
        let mut sender = [0u8; COMPONENT_ID_LEN];
        cursor.copy_to_slice(&mut sender);
        let mut receiver = [0u8; COMPONENT_ID_LEN];
        cursor.copy_to_slice(&mut receiver);
        Ok(Self {
            code,
            data_length,
            message_number,
            activity_id,
            timestamp,
            sender,
            receiver,
        })
    }
}
