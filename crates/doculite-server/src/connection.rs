//! Per-connection request loop.
//!
//! Each connection reads framed requests and writes framed replies until
//! the peer closes, an I/O error occurs, or an unrecognized opcode
//! arrives (answered with an error, then closed).

use std::io::{self, BufReader, ErrorKind, Read};
use std::net::TcpStream;
use std::sync::Arc;

use doculite_wire::{
    write_op_msg, write_op_reply, MessageHeader, OpMsg, OpQuery, WireError, OP_MSG, OP_QUERY,
};
use tracing::{debug, warn};

use crate::dispatch::{error_reply, Dispatcher, ERR_BAD_VALUE};
use crate::error::ServerResult;

pub(crate) struct Connection {
    stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> Self {
        Self { stream, dispatcher }
    }

    /// Runs the request loop until the connection ends.
    pub(crate) fn serve(mut self) -> ServerResult<()> {
        let peer = self.stream.peer_addr()?;
        debug!(%peer, "connection accepted");
        let mut reader = BufReader::new(self.stream.try_clone()?);

        loop {
            let header = match MessageHeader::read_from(&mut reader) {
                Ok(header) => header,
                Err(WireError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!(%peer, "peer closed connection");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%peer, error = %e, "failed to read message header");
                    return Err(e.into());
                }
            };

            match header.op_code {
                OP_MSG => self.handle_op_msg(&mut reader, header)?,
                OP_QUERY => self.handle_op_query(&mut reader, header)?,
                other => {
                    // Drain the body so the error reply is cleanly framed,
                    // then close.
                    io::copy(
                        &mut reader.by_ref().take(header.body_length() as u64),
                        &mut io::sink(),
                    )?;
                    warn!(%peer, opcode = other, "unsupported opcode");
                    let reply =
                        error_reply(ERR_BAD_VALUE, "BadValue", format!("unsupported opcode: {other}"));
                    write_op_msg(&mut self.stream, header.request_id, &reply)?;
                    return Ok(());
                }
            }
        }
    }

    fn handle_op_msg(
        &mut self,
        reader: &mut BufReader<TcpStream>,
        header: MessageHeader,
    ) -> ServerResult<()> {
        let msg = OpMsg::read_from(reader, header)?;
        let suppress_reply = msg.more_to_come();

        let reply = match msg.into_parts() {
            Ok((body, sequences)) => self.dispatcher.handle(body, sequences),
            Err(e) => error_reply(ERR_BAD_VALUE, "BadValue", e.to_string()),
        };

        if suppress_reply {
            return Ok(());
        }
        write_op_msg(&mut self.stream, header.request_id, &reply)?;
        Ok(())
    }

    fn handle_op_query(
        &mut self,
        reader: &mut BufReader<TcpStream>,
        header: MessageHeader,
    ) -> ServerResult<()> {
        let query = OpQuery::read_from(reader, header)?;

        // The namespace carries the database; hand it to dispatch the same
        // way OP_MSG requests do.
        let mut cmd = query.query.clone();
        if !cmd.contains_key("$db") {
            cmd.insert("$db", query.database().to_string());
        }

        let reply = self.dispatcher.handle(cmd, Vec::new());
        write_op_reply(&mut self.stream, header.request_id, &reply)?;
        Ok(())
    }
}
