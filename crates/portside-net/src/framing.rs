//! Newline-delimited message framing.
//!
//! TCP is a byte stream with no message boundaries, so the crate imposes
//! one framing rule: every message is terminated by `\n` on the wire, and
//! a trailing `\r` before the delimiter is stripped on receive. Payloads
//! are otherwise opaque. This makes "one send = one receive" hold for any
//! payload that contains no newline, regardless of how the bytes are
//! chunked by the socket.

use bytes::BytesMut;

/// Frame a payload for the wire by appending the delimiter.
pub(crate) fn encode(payload: &str) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.extend_from_slice(payload.as_bytes());
    framed.push(b'\n');
    framed
}

/// Accumulates raw socket reads and yields complete messages.
///
/// Partial lines are buffered across reads, so a message larger than the
/// read buffer is reassembled once its delimiter arrives.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buf: BytesMut,
}

impl LineDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns every message it completes, in order.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, since payloads are
    /// opaque to the transport.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            messages.push(String::from_utf8_lossy(&line[..end]).into_owned());
        }
        messages
    }
}
