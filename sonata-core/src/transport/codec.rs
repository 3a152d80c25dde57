//! Length-prefixed framing over a byte stream, via `tokio_util::codec`.
//!
//! A frame is a [`MessageHeader`](super::frame::MessageHeader) followed by
//! exactly `data_length` body bytes. The decoder does not interpret the
//! body; callers dispatch on `header.code` to parse it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{FrameError, MessageHeader, HEADER_LEN};

/// A decoded frame: header plus opaque body bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub header: MessageHeader,
    pub body: Bytes,
}

/// `tokio_util` codec implementing the component wire protocol.
#[derive(Default)]
pub struct MessageCodec {
    /// Cached length of the frame currently being assembled, once the
    /// header has been seen but the full body has not yet arrived.
    pending_len: Option<usize>,
}

impl Decoder for MessageCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let body_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let header = MessageHeader::demarshal(src)?;
                self.pending_len = Some(header.data_length as usize);
                header.data_length as usize
            }
        };

        if src.len() < HEADER_LEN + body_len {
            return Ok(None);
        }

        let header = MessageHeader::demarshal(src)?;
        let mut frame_bytes = src.split_to(HEADER_LEN + body_len);
        frame_bytes.advance(HEADER_LEN);
        self.pending_len = None;

        Ok(Some(Frame {
            header,
            body: frame_bytes.freeze(),
        }))
    }
}

impl Encoder<Frame> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        dst.reserve(HEADER_LEN + item.body.len());
        item.header.marshal(dst);
        dst.put_slice(&item.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::activity_id::ActivityId;
    use crate::transport::frame::{component_id, MessageCode, Timestamp};

    fn sample_frame(body: &[u8]) -> Frame {
        Frame {
            header: MessageHeader {
                code: MessageCode(MessageCode::DX_BASE + 1),
                data_length: body.len() as u32,
                message_number: 1,
                activity_id: ActivityId::new(9),
                timestamp: Timestamp { sec: 1_700_000_000, usec: 0 },
                sender: component_id("dx1"),
                receiver: component_id("sse"),
            },
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn encode_then_decode_recovers_frame() {
        let mut codec = MessageCodec::default();
        let frame = sample_frame(b"hello world");
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_header() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::from(&[0u8; 4][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_waits_for_full_body() {
        let mut codec = MessageCodec::default();
        let frame = sample_frame(b"partial-body-test");
        let mut full = BytesMut::new();
        codec.encode(frame, &mut full).unwrap();

        let mut truncated = BytesMut::from(&full[..HEADER_LEN + 3]);
        assert_eq!(codec.decode(&mut truncated).unwrap(), None);
    }

    #[test]
    fn decode_handles_back_to_back_frames() {
        let mut codec = MessageCodec::default();
        let a = sample_frame(b"first");
        let b = sample_frame(b"second-frame");
        let mut buf = BytesMut::new();
        codec.encode(a.clone(), &mut buf).unwrap();
        codec.encode(b.clone(), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);
    }
}
