//! Incremental Server-Sent Events parser
//!
//! Shared by the OpenRouter completion stream and the legacy MCP SSE
//! transport.

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, `message` when the server sent none
    pub event: String,
    /// Data lines joined by `\n`
    pub data: String,
}

/// Feeds raw bytes in, gets complete events out
///
/// Lines may be split across chunks at any byte, including inside a UTF-8
/// sequence.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return the events it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    /// Flush a final event not terminated by a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            // A non-blank line never dispatches on its own
            self.push(b"\n");
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(body: &[u8]) -> Vec<SseEvent> {
        let mut parser = SseParser::new();
        let mut events = parser.push(body);
        events.extend(parser.finish());
        events
    }

    #[test]
    fn test_endpoint_and_message_events() {
        let mut parser = SseParser::new();
        let events = parser.push(
            b"event: endpoint\ndata: /messages/?session_id=abc\n\n\
              event: message\ndata: {\"id\":1}\n\n",
        );
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "endpoint".to_string(),
                    data: "/messages/?session_id=abc".to_string(),
                },
                SseEvent {
                    event: "message".to_string(),
                    data: "{\"id\":1}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_split_chunks_and_crlf() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: hel").is_empty());
        assert!(parser.push(b"lo\r\n").is_empty());
        let events = parser.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_split_inside_utf8_sequence() {
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.len() - 4;
        let mut parser = SseParser::new();
        assert!(parser.push(&bytes[..split]).is_empty());
        let events = parser.push(&bytes[split..]);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_comments_multiline_and_empty_events() {
        let events = parse_all(b": keep-alive\n\nevent: ping\n\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_unterminated_final_event() {
        let events = parse_all(b"event: message\ndata: {\"id\":2}");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"id\":2}");
    }
}
