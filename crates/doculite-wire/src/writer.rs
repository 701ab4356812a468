//! Reply framing: OP_MSG and the legacy OP_REPLY.

use std::io::Write;

use bson::Document;
use bytes::{BufMut, BytesMut};

use crate::error::{WireError, WireResult};
use crate::header::{next_request_id, MessageHeader, HEADER_SIZE, OP_MSG, OP_REPLY};

/// Writes a single-document OP_MSG reply with no flags.
pub fn write_op_msg(writer: &mut impl Write, response_to: i32, doc: &Document) -> WireResult<()> {
    let body = encode_document(doc)?;

    // header + flagBits + section kind + body
    let message_length = (HEADER_SIZE + 4 + 1 + body.len()) as i32;
    let mut buf = BytesMut::with_capacity(message_length as usize);
    MessageHeader {
        message_length,
        request_id: next_request_id(),
        response_to,
        op_code: OP_MSG,
    }
    .encode(&mut buf);
    buf.put_u32_le(0); // flag bits
    buf.put_u8(0); // body section kind
    buf.put_slice(&body);

    writer.write_all(&buf)?;
    Ok(())
}

/// Writes a single-document OP_REPLY, the response format for OP_QUERY.
pub fn write_op_reply(writer: &mut impl Write, response_to: i32, doc: &Document) -> WireResult<()> {
    let body = encode_document(doc)?;

    // header + responseFlags + cursorId + startingFrom + numberReturned + body
    let message_length = (HEADER_SIZE + 4 + 8 + 4 + 4 + body.len()) as i32;
    let mut buf = BytesMut::with_capacity(message_length as usize);
    MessageHeader {
        message_length,
        request_id: next_request_id(),
        response_to,
        op_code: OP_REPLY,
    }
    .encode(&mut buf);
    buf.put_i32_le(0); // response flags
    buf.put_i64_le(0); // cursor id
    buf.put_i32_le(0); // starting from
    buf.put_i32_le(1); // number returned
    buf.put_slice(&body);

    writer.write_all(&buf)?;
    Ok(())
}

fn encode_document(doc: &Document) -> WireResult<Vec<u8>> {
    let mut body = Vec::new();
    doc.to_writer(&mut body)
        .map_err(|e| WireError::Document(e.to_string()))?;
    Ok(body)
}
