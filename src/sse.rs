//! Incremental decoder for the `/events` server-push stream.
//!
//! The wire format is standard `text/event-stream`: `event:`/`data:`
//! fields, blank-line frame terminators, `:`-prefixed comments. Network
//! chunks arrive at arbitrary boundaries, so the decoder buffers bytes and
//! only emits events for complete frames.

/// One named push frame with its joined data payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, get every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.consume_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn consume_line(&mut self, line: &str) -> Option<SseEvent> {
        // Blank line terminates the frame. A frame that carried no data
        // (e.g. only an `event:` field) is not dispatched.
        if line.is_empty() {
            let name = self.event_name.take();
            if self.data_lines.is_empty() {
                return None;
            }
            let data = self.data_lines.join("\n");
            self.data_lines.clear();
            return Some(SseEvent {
                name: name.unwrap_or_else(|| "message".to_string()),
                data,
            });
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // `id` and `retry` carry no information we use.
            _ => {}
        }
        None
    }
}
