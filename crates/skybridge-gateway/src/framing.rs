//! Newline-delimited framing for the stream transport.

use bytes::BytesMut;
use skybridge_rpc::types::Response;
use tracing::error;

/// Accumulates raw stream bytes and extracts newline-delimited payloads.
///
/// Owned exclusively by one connection's read task; the buffer is never
/// shared. Bytes without a trailing delimiter stay buffered until more
/// data arrives — partial input is never an error.
#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: BytesMut,
}

impl StreamFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and extract every complete payload, in order.
    ///
    /// The delimiter (and an optional preceding `\r`) is stripped.
    /// Whitespace-only lines are skipped. Invalid UTF-8 is replaced so the
    /// payload still reaches the dispatcher (and fails JSON parsing there).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let line = &line[..line.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let text = String::from_utf8_lossy(line);
            if !text.trim().is_empty() {
                payloads.push(text.into_owned());
            }
        }
        payloads
    }

    /// Bytes currently buffered without a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

/// Serialize a response as one JSON text value.
///
/// The stream writer appends the newline delimiter; the message transport
/// sends the text as one frame.
pub fn encode_text(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        error!(error = %e, "failed to serialize response");
        String::new()
    })
}
