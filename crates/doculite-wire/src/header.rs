//! The 16-byte message header shared by every wire message.

use std::io::Read;
use std::sync::atomic::{AtomicI32, Ordering};

use bytes::{BufMut, BytesMut};

use crate::error::{WireError, WireResult};

/// Legacy single-document reply.
pub const OP_REPLY: i32 = 1;
/// Legacy query, used by drivers for the initial handshake.
pub const OP_QUERY: i32 = 2004;
/// Modern extensible message.
pub const OP_MSG: i32 = 2013;

/// Header size in bytes: length, request id, response-to, opcode.
pub const HEADER_SIZE: usize = 16;

/// Largest message the server will read, matching the advertised
/// `maxMessageSizeBytes`.
pub const MAX_MESSAGE_SIZE: i32 = 48_000_000;

static REQUEST_ID: AtomicI32 = AtomicI32::new(0);

/// Returns the next request id from the process-wide counter. Ids are
/// unique over the i32 range; wrap-around is ignored.
pub fn next_request_id() -> i32 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

/// The standard message header, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message length, header included.
    pub message_length: i32,
    /// Sender-chosen id for this message.
    pub request_id: i32,
    /// Request id this message responds to (0 for requests).
    pub response_to: i32,
    /// Operation code.
    pub op_code: i32,
}

impl MessageHeader {
    /// Reads a header from the stream. An immediate clean EOF surfaces as
    /// an `UnexpectedEof` I/O error, which connection loops treat as the
    /// peer closing.
    pub fn read_from(reader: &mut impl Read) -> WireResult<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        let header = Self::from_bytes(&raw);
        header.validate()?;
        Ok(header)
    }

    fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let field = |at: usize| {
            i32::from_le_bytes(raw[at..at + 4].try_into().expect("4-byte header field"))
        };
        Self {
            message_length: field(0),
            request_id: field(4),
            response_to: field(8),
            op_code: field(12),
        }
    }

    fn validate(&self) -> WireResult<()> {
        if self.message_length < HEADER_SIZE as i32 {
            return Err(WireError::Malformed(format!(
                "message length {} shorter than header",
                self.message_length
            )));
        }
        if self.message_length > MAX_MESSAGE_SIZE {
            return Err(WireError::Malformed(format!(
                "message length {} exceeds maximum {}",
                self.message_length, MAX_MESSAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Length of the body following the header.
    pub fn body_length(&self) -> usize {
        (self.message_length as usize).saturating_sub(HEADER_SIZE)
    }

    /// Appends the wire encoding of this header to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.message_length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.op_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let header = MessageHeader {
            message_length: 1234,
            request_id: 7,
            response_to: 3,
            op_code: OP_MSG,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let parsed = MessageHeader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn little_endian_layout() {
        let header = MessageHeader {
            message_length: 0x0102_0304,
            request_id: 0,
            response_to: 0,
            op_code: OP_REPLY,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..4], [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[12..16], [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn rejects_absurd_lengths() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..4].copy_from_slice(&8i32.to_le_bytes());
        assert!(MessageHeader::read_from(&mut &raw[..]).is_err());

        raw[..4].copy_from_slice(&(MAX_MESSAGE_SIZE + 1).to_le_bytes());
        assert!(MessageHeader::read_from(&mut &raw[..]).is_err());
    }

    #[test]
    fn request_ids_are_monotonic() {
        let first = next_request_id();
        let second = next_request_id();
        assert!(second > first);
    }
}
