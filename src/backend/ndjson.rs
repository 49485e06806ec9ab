//! Buffered decoder for newline-delimited JSON streams.
//!
//! Ollama streams one JSON object per line, and a single object is often
//! split across TCP chunk boundaries.

use serde_json::Value;

/// Buffered decoder for newline-delimited JSON streams (NDJSON).
///
/// Accumulates raw bytes, splits on newline boundaries, and yields
/// complete JSON lines. Lines that are not JSON are skipped.
///
/// # Example
///
/// ```
/// use llm_scaffold::backend::ndjson::NdjsonDecoder;
///
/// let mut decoder = NdjsonDecoder::new();
///
/// let values = decoder.decode(b"{\"message\":");
/// assert!(values.is_empty());
///
/// let values = decoder.decode(b"{\"content\":\"hi\"}}\n");
/// assert_eq!(values.len(), 1);
/// assert_eq!(values[0]["message"]["content"], "hi");
/// ```
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Create a new empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk into the decoder and return any complete JSON lines.
    ///
    /// Bytes are buffered until a newline arrives, so multi-byte UTF-8
    /// characters split across chunks survive intact.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(val) = serde_json::from_str::<Value>(line) {
                values.push(val);
            }
        }

        values
    }

    /// Parse whatever is left in the buffer after the stream ends.
    ///
    /// Returns `None` if the remainder is empty or not a complete JSON value.
    pub fn flush(&mut self) -> Option<Value> {
        let remaining = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        if remaining.is_empty() {
            return None;
        }
        serde_json::from_str::<Value>(&remaining).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_lines() {
        let mut decoder = NdjsonDecoder::new();
        let chunk = b"{\"response\":\"hello\"}\n{\"response\":\"world\"}\n";
        let values = decoder.decode(chunk);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["response"], "hello");
        assert_eq!(values[1]["response"], "world");
    }

    #[test]
    fn test_split_mid_value() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.decode(b"{\"response\":\"hel").is_empty());
        assert!(decoder.decode(b"lo wor").is_empty());

        let v3 = decoder.decode(b"ld\"}\n");
        assert_eq!(v3.len(), 1);
        assert_eq!(v3[0]["response"], "hello world");
    }

    #[test]
    fn test_split_inside_multibyte_char() {
        let mut decoder = NdjsonDecoder::new();
        let line = "{\"response\":\"caf\u{e9}\"}\n".as_bytes();
        // Split between the two bytes of 'é'.
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(decoder.decode(&line[..split]).is_empty());
        let values = decoder.decode(&line[split..]);
        assert_eq!(values[0]["response"], "caf\u{e9}");
    }

    #[test]
    fn test_multiple_chunks_multiple_lines() {
        let mut decoder = NdjsonDecoder::new();

        let v1 = decoder.decode(b"{\"a\":1}\n{\"b\":");
        assert_eq!(v1.len(), 1);
        assert_eq!(v1[0]["a"], 1);

        let v2 = decoder.decode(b"2}\n");
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0]["b"], 2);
    }

    #[test]
    fn test_flush_remaining() {
        let mut decoder = NdjsonDecoder::new();
        decoder.decode(b"{\"done\":true}");
        let flushed = decoder.flush();
        assert_eq!(flushed.unwrap()["done"], json!(true));
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn test_flush_truncated_is_none() {
        let mut decoder = NdjsonDecoder::new();
        decoder.decode(b"{\"message\": {\"content\": \"abc");
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn test_non_json_lines_skipped() {
        let mut decoder = NdjsonDecoder::new();
        let values = decoder.decode(b"not json\n{\"ok\":true}\ngarbage\n");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["ok"], json!(true));
    }
}
