//! Line-based codec for control connections.
//!
//! Requests are terminated with `\n` (a `\r\n` pair is accepted). A client
//! that closes its write half without a terminator still gets its buffered
//! bytes treated as the request.

use bytes::BytesMut;

use crate::LineOverflow;

/// Maximum request line length.
pub const MAX_LINE_LENGTH: usize = 1024;

/// A codec for reading request lines and writing response lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Add received data to the buffer.
    ///
    /// Fails once more than [`MAX_LINE_LENGTH`] bytes are buffered without a
    /// line terminator.
    pub fn push(&mut self, data: &[u8]) -> Result<(), LineOverflow> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > MAX_LINE_LENGTH && !self.buffer.contains(&b'\n') {
            log::debug!("request exceeded {} bytes without newline", MAX_LINE_LENGTH);
            return Err(LineOverflow {
                max: MAX_LINE_LENGTH,
                actual: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Try to decode a complete, non-empty line from the buffer.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let line_data = self.buffer.split_to(end + 1);
            let line = String::from_utf8_lossy(&line_data).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Take whatever is buffered as a final unterminated line.
    pub fn take_remaining(&mut self) -> Option<String> {
        let rest = self.buffer.split();
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }

    /// Encode a response for transmission, ensuring it ends with `\n`.
    pub fn encode_reply(reply: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(reply.len() + 1);
        buf.extend_from_slice(reply.as_bytes());
        if !reply.ends_with('\n') {
            buf.push(b'\n');
        }
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
