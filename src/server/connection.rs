// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-connection state: accumulation buffer, parse loop, output buffer.
//!
//! Mirrors the shape of a framed [`crate::server`]-less connection in
//! spirit — a read buffer fed by the socket, a codec that pulls
//! complete units out of it, and a send queue with partial-write
//! tracking — but the codec here is [`crate::protocol::parse_request`]
//! rather than a length-prefixed frame, and completed requests are
//! dispatched into a shared [`Processor`] rather than handed up the
//! stack as discrete messages.

use std::io::{self, Read, Write};

use mio::net::TcpStream;

use crate::command::{DispatchResult, Processor};
use crate::protocol::{parse_request, ParseOutcome, ResponseWriter};

/// Growable scratch space for one read(2) call.
const READ_CHUNK: usize = 16 * 1024;

/// A single client connection: its socket, accumulated unparsed input,
/// and queued-but-unsent output.
pub struct Connection {
    stream: TcpStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    write_offset: usize,
    closing: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: Vec::with_capacity(READ_CHUNK),
            write_buf: Vec::new(),
            write_offset: 0,
            closing: false,
        }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Whether this connection has sent `QUIT` or hit a fatal I/O error
    /// and should be torn down once its output buffer drains.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn has_pending_write(&self) -> bool {
        self.write_offset < self.write_buf.len()
    }

    /// Drain readable bytes from the socket, parse as many complete
    /// requests as are buffered, and dispatch each into `processor`.
    /// Returns `Ok(false)` if the peer closed the connection.
    pub fn handle_readable(&mut self, processor: &mut Processor) -> io::Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.drain_requests(processor);
        Ok(true)
    }

    fn drain_requests(&mut self, processor: &mut Processor) {
        loop {
            match parse_request(&self.read_buf) {
                Ok(ParseOutcome::Incomplete) => break,
                Ok(ParseOutcome::Complete(req, consumed)) => {
                    let mut writer = ResponseWriter::new(&mut self.write_buf);
                    if processor.dispatch(&req, &mut writer) == DispatchResult::Quit {
                        self.closing = true;
                    }
                    self.read_buf.drain(..consumed);
                }
                Err(err) => {
                    let mut writer = ResponseWriter::new(&mut self.write_buf);
                    writer.client_error(&err.message);
                    self.read_buf.drain(..err.consumed);
                }
            }
            if self.closing {
                break;
            }
        }
    }

    /// Write as much of the pending output buffer as the socket will
    /// currently accept. Returns `Ok(false)` on a hard write failure
    /// that should tear the connection down.
    pub fn handle_writable(&mut self) -> io::Result<bool> {
        while self.write_offset < self.write_buf.len() {
            match self.stream.write(&self.write_buf[self.write_offset..]) {
                Ok(0) => return Ok(false),
                Ok(n) => self.write_offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return Ok(false),
            }
        }
        self.write_buf.clear();
        self.write_offset = 0;
        Ok(true)
    }
}
