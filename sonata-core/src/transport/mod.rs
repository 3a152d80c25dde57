//! Wire protocol: message headers and the length-prefixed framing codec.

pub mod codec;
pub mod frame;

pub use codec::{Frame, MessageCodec};
pub use frame::{component_id, ComponentId, FrameError, MessageCode, MessageHeader, Timestamp, COMPONENT_ID_LEN, HEADER_LEN, MAX_DATA_LEN};
