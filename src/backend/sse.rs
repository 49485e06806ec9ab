//! Server-sent events framing for chat-completions streams.
//!
//! Bytes arrive in arbitrary chunks; only complete `data:` lines are decoded.

use serde_json::Value;

/// Turns raw response bytes into JSON events, remembering `[DONE]`.
///
/// # Example
///
/// ```
/// use llm_scaffold::backend::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let values = decoder.decode(data);
/// assert_eq!(values.len(), 1);
/// assert!(decoder.is_done());
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Create a new empty SSE decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `data: [DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes into the decoder and return any complete JSON payloads.
    ///
    /// Ignores `event:`, `id:`, comment and keep-alive lines. Returns parsed
    /// JSON for each complete `data:` line (excluding the `[DONE]` terminator).
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(val) = self.decode_line(line.trim()) {
                values.push(val);
            }
        }

        values
    }

    /// Flush any remaining buffer content.
    pub fn flush(&mut self) -> Vec<Value> {
        let remaining = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();

        let mut values = Vec::new();
        for line in remaining.lines() {
            if let Some(val) = self.decode_line(line.trim()) {
                values.push(val);
            }
        }
        values
    }

    fn decode_line(&mut self, line: &str) -> Option<Value> {
        let data = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))?
            .trim();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        serde_json::from_str::<Value>(data).ok()
    }
}
