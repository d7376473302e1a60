//! Incremental Server-Sent Events decoder.
//!
//! `message/stream` responses carry one JSON-RPC response per event, in the
//! `data:` field. Chunks from the HTTP body are fed in as they arrive and
//! complete events are returned in order.

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from the `event:` field, if present.
    pub event: Option<String>,
    /// Event id from the `id:` field, if present.
    pub id: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
}

/// Buffers partial input and emits complete events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    ///
    /// Events are delimited by a blank line. `\r\n` line endings are
    /// normalized first.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = Self::parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\n');
        if rest.is_empty() {
            None
        } else {
            Self::parse_block(rest)
        }
    }

    fn parse_block(text: &str) -> Option<SseEvent> {
        let mut event = None;
        let mut id = None;
        let mut data = Vec::new();

        for line in text.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data.push(value),
                "event" => event = Some(value.to_string()),
                "id" => id = Some(value.to_string()),
                _ => {}
            }
        }

        if data.is_empty() {
            return None;
        }

        Some(SseEvent {
            event,
            id,
            data: data.join("\n"),
        })
    }
}
