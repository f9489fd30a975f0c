//! Byte stream -> line framing
//!
//! Serial reads return arbitrary chunks. The framer buffers them and yields
//! complete lines, dropping `\r`, skipping blank lines and discarding anything
//! longer than [`MAX_LINE_LEN`].

use bytes::{Buf, BytesMut};

use crate::{WireError, WireResult};

/// Maximum accepted line length in bytes (terminator excluded)
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
    /// Dropping the tail of an overlong line until the next newline
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        LineFramer {
            buf: BytesMut::with_capacity(MAX_LINE_LEN),
            discarding: false,
        }
    }

    /// Feed a chunk read from the link
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet terminated
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete line, if any.
    ///
    /// An overlong line yields a single `LineTooLong` error once its
    /// terminator arrives.
    pub fn next_line(&mut self) -> Option<WireResult<String>> {
        loop {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                if self.buf.len() > MAX_LINE_LEN {
                    self.buf.clear();
                    self.discarding = true;
                }
                return None;
            };

            let raw = self.buf.split_to(pos);
            self.buf.advance(1);

            if self.discarding {
                self.discarding = false;
                return Some(Err(WireError::LineTooLong { max: MAX_LINE_LEN }));
            }
            if raw.len() > MAX_LINE_LEN {
                return Some(Err(WireError::LineTooLong { max: MAX_LINE_LEN }));
            }

            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            return Some(Ok(line.to_string()));
        }
    }
}
