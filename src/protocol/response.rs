// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Append-only response frame writer.
//!
//! Wraps the caller-provided output buffer so dispatch code in
//! [`crate::command`] never has to scatter `\r\n` literals inline —
//! each wire response is a single named method here.

pub struct ResponseWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    fn line(&mut self, s: &[u8]) {
        self.buf.extend_from_slice(s);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// `VALUE <key> <flags> <len> [<cas>]\r\n<bytes>\r\n`
    pub fn value(&mut self, key: &[u8], flags: u32, bytes: &[u8], cas: Option<u64>) {
        self.buf.extend_from_slice(b"VALUE ");
        self.buf.extend_from_slice(key);
        self.buf.push(b' ');
        self.buf.extend_from_slice(flags.to_string().as_bytes());
        self.buf.push(b' ');
        self.buf.extend_from_slice(bytes.len().to_string().as_bytes());
        if let Some(cas) = cas {
            self.buf.push(b' ');
            self.buf.extend_from_slice(cas.to_string().as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn end(&mut self) {
        self.line(b"END");
    }

    pub fn stored(&mut self) {
        self.line(b"STORED");
    }

    pub fn not_stored(&mut self) {
        self.line(b"NOT_STORED");
    }

    pub fn exists(&mut self) {
        self.line(b"EXISTS");
    }

    pub fn not_found(&mut self) {
        self.line(b"NOT_FOUND");
    }

    pub fn deleted(&mut self) {
        self.line(b"DELETED");
    }

    pub fn client_error(&mut self, message: &str) {
        self.buf.extend_from_slice(b"CLIENT_ERROR ");
        self.line(message.as_bytes());
    }

    pub fn server_error(&mut self, message: &str) {
        self.buf.extend_from_slice(b"SERVER_ERROR ");
        self.line(message.as_bytes());
    }

    /// Bare decimal frame, used by `incr`/`decr` on success.
    pub fn integer(&mut self, n: u64) {
        self.line(n.to_string().as_bytes());
    }

    /// `STAT <name> <value>\r\n`
    pub fn stat(&mut self, name: &str, value: u64) {
        self.buf.extend_from_slice(b"STAT ");
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.push(b' ');
        self.line(value.to_string().as_bytes());
    }
}
