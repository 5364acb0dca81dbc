//! Incremental decoding of the Messages API server-sent event stream.
//!
//! Network chunks do not respect line or UTF-8 boundaries, so bytes are
//! buffered until a full `\n`-terminated line is available.

use serde_json::Value;

/// What a single `data:` payload means for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// A piece of generated text, in arrival order.
    Text(String),
    InputTokens(u32),
    OutputTokens(u32),
    StopReason(String),
    /// The API reported an error mid-stream.
    Error(String),
    /// `message_stop`: nothing else will follow.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every update completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamUpdate> {
        self.buffer.extend_from_slice(bytes);
        let mut updates = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                updates.extend(parse_payload(data.trim_start()));
            }
        }
        updates
    }

    /// Flushes a trailing line that never got its newline.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.buffer.push(b'\n');
        self.push(&[])
    }
}

fn parse_payload(data: &str) -> Vec<StreamUpdate> {
    let parsed: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    match parsed["type"].as_str() {
        Some("message_start") => parsed["message"]["usage"]["input_tokens"]
            .as_u64()
            .map(|n| vec![StreamUpdate::InputTokens(n as u32)])
            .unwrap_or_default(),
        Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
            Some(text) if !text.is_empty() => vec![StreamUpdate::Text(text.to_string())],
            _ => Vec::new(),
        },
        Some("message_delta") => {
            let mut updates = Vec::new();
            if let Some(reason) = parsed["delta"]["stop_reason"].as_str() {
                updates.push(StreamUpdate::StopReason(reason.to_string()));
            }
            if let Some(n) = parsed["usage"]["output_tokens"].as_u64() {
                updates.push(StreamUpdate::OutputTokens(n as u32));
            }
            updates
        }
        Some("error") => vec![StreamUpdate::Error(
            parsed["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string(),
        )],
        Some("message_stop") => vec![StreamUpdate::Done],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA_HEL: &str = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n";

    #[test]
    fn test_text_delta() {
        let mut d = SseDecoder::new();
        assert_eq!(d.push(DELTA_HEL.as_bytes()), vec![StreamUpdate::Text("Hel".into())]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut d = SseDecoder::new();
        let (a, b) = DELTA_HEL.split_at(40);
        assert!(d.push(a.as_bytes()).is_empty());
        assert_eq!(d.push(b.as_bytes()), vec![StreamUpdate::Text("Hel".into())]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let payload = "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"café\"}}\n";
        let bytes = payload.as_bytes();
        let cut = payload.find('é').unwrap() + 1; // inside the two-byte sequence
        let mut d = SseDecoder::new();
        assert!(d.push(&bytes[..cut]).is_empty());
        assert_eq!(d.push(&bytes[cut..]), vec![StreamUpdate::Text("café".into())]);
    }

    #[test]
    fn test_message_lifecycle_events() {
        let body = concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":42,\"output_tokens\":1}}}\n",
            "data: {\"type\":\"ping\"}\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":7}}\n",
            "data: {\"type\":\"message_stop\"}\n",
        );
        let mut d = SseDecoder::new();
        assert_eq!(
            d.push(body.as_bytes()),
            vec![
                StreamUpdate::InputTokens(42),
                StreamUpdate::StopReason("end_turn".into()),
                StreamUpdate::OutputTokens(7),
                StreamUpdate::Done,
            ]
        );
    }

    #[test]
    fn test_error_event() {
        let mut d = SseDecoder::new();
        let updates = d.push(
            b"data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\r\n",
        );
        assert_eq!(updates, vec![StreamUpdate::Error("Overloaded".into())]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: {\"type\":\"message_stop\"}").is_empty());
        assert_eq!(d.finish(), vec![StreamUpdate::Done]);
        assert!(d.finish().is_empty());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut d = SseDecoder::new();
        assert!(d.push(b": keepalive\ndata: not json\n\n").is_empty());
    }
}
