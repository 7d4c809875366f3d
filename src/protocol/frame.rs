//! Frame encoding and decoding for the management protocol.
//!
//! Every message, in either direction, uses the same header:
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────────────┐
//! │ opcode (LE)  │  index (LE)  │  length (LE) │    payload      │
//! │   2 bytes    │   2 bytes    │   2 bytes    │  length bytes   │
//! └──────────────┴──────────────┴──────────────┴─────────────────┘
//! ```
//! Replies reuse the header with `CMD_STATUS` or `CMD_COMPLETE` as opcode and
//! the original command opcode at the start of the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::opcode::EventCode;
use crate::protocol::status::Status;

/// Controller index addressing the registry rather than a controller.
pub const INDEX_NONE: u16 = 0xFFFF;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 6;

/// Maximum payload size a header can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command opcode or event code.
    pub opcode: u16,
    /// Target controller index, or [`INDEX_NONE`].
    pub index: u16,
    /// Declared payload length.
    pub len: u16,
}

/// A decoded frame: header plus exactly `header.len` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame header.
    pub header: Header,
    /// The payload.
    pub payload: Bytes,
}

/// Decodes one frame from a complete datagram.
///
/// # Errors
///
/// Returns a `FrameError` if:
/// - The buffer is shorter than the header
/// - The declared length does not equal the bytes following the header
pub fn decode(data: &[u8]) -> Result<Frame, FrameError> {
    if data.len() < HEADER_SIZE {
        return Err(FrameError::TooShort(data.len()));
    }

    let mut cursor = data;
    let opcode = cursor.get_u16_le();
    let index = cursor.get_u16_le();
    let len = cursor.get_u16_le();

    if usize::from(len) != cursor.len() {
        return Err(FrameError::LengthMismatch {
            opcode,
            index,
            declared: usize::from(len),
            actual: cursor.len(),
        });
    }

    Ok(Frame {
        header: Header { opcode, index, len },
        payload: Bytes::copy_from_slice(cursor),
    })
}

/// Encodes a frame with the given header fields and payload.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload does not fit a 16-bit length.
pub fn encode(opcode: u16, index: u16, payload: &[u8]) -> Result<Bytes, FrameError> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u16_le(opcode);
    buf.put_u16_le(index);
    buf.put_u16_le(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Encodes a `CMD_STATUS` reply: `{opcode:u16, status:u8}`.
#[must_use]
pub fn encode_status(index: u16, opcode: u16, status: Status) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + 3);
    buf.put_u16_le(EventCode::CmdStatus.into());
    buf.put_u16_le(index);
    buf.put_u16_le(3);
    buf.put_u16_le(opcode);
    buf.put_u8(status.into());
    buf.freeze()
}

/// Encodes a `CMD_COMPLETE` reply: `{opcode:u16, result...}`.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the result does not fit in one frame.
pub fn encode_complete(index: u16, opcode: u16, result: &[u8]) -> Result<Bytes, FrameError> {
    let len = result.len() + 2;
    let len = u16::try_from(len).map_err(|_| FrameError::TooLarge(len))?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + usize::from(len));
    buf.put_u16_le(EventCode::CmdComplete.into());
    buf.put_u16_le(index);
    buf.put_u16_le(len);
    buf.put_u16_le(opcode);
    buf.put_slice(result);
    Ok(buf.freeze())
}

/// Encodes an asynchronous event frame.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload does not fit in one frame.
pub fn encode_event(code: EventCode, index: u16, payload: &[u8]) -> Result<Bytes, FrameError> {
    encode(code.into(), index, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_frame() {
        let frame = decode(&[0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]).unwrap();
        assert_eq!(frame.header.opcode, 0x0005);
        assert_eq!(frame.header.index, 0);
        assert_eq!(frame.header.len, 1);
        assert_eq!(frame.payload, Bytes::from_static(&[0x01]));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            decode(&[0x05, 0x00, 0x00]),
            Err(FrameError::TooShort(3))
        ));
    }

    #[test]
    fn test_decode_length_mismatch_keeps_header() {
        // Declares two bytes, carries one
        let err = decode(&[0x06, 0x00, 0x02, 0x00, 0x02, 0x00, 0x01]).unwrap_err();
        match err {
            FrameError::LengthMismatch {
                opcode,
                index,
                declared,
                actual,
            } => {
                assert_eq!(opcode, 0x0006);
                assert_eq!(index, 2);
                assert_eq!(declared, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Trailing garbage is rejected as well
        assert!(decode(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xAA]).is_err());
    }

    #[test]
    fn test_encode_status_layout() {
        let frame = encode_status(INDEX_NONE, 0x0005, Status::Busy);
        assert_eq!(
            &frame[..],
            &[0x02, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x05, 0x00, 16]
        );
    }

    #[test]
    fn test_encode_complete_layout() {
        let frame = encode_complete(1, 0x0006, &[0x01]).unwrap();
        assert_eq!(
            &frame[..],
            &[0x01, 0x00, 0x01, 0x00, 0x03, 0x00, 0x06, 0x00, 0x01]
        );
    }

    #[test]
    fn test_encoded_frames_decode() {
        let frame = encode_event(EventCode::Powered, 3, &[1]).unwrap();
        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.header.opcode, EventCode::Powered as u16);
        assert_eq!(decoded.header.index, 3);
        assert_eq!(&decoded.payload[..], &[1]);
    }

    #[test]
    fn test_encode_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            encode(0x0001, 0, &payload),
            Err(FrameError::TooLarge(_))
        ));
    }
}
