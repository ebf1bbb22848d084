use serde_json::Value;

use super::ChatEvent;

/// Line-oriented typed event protocol: `event: <type>\ndata: <json>\n\n`.
pub struct EventStreamEncoder;

impl EventStreamEncoder {
    pub const CONTENT_TYPE: &'static str = "text/event-stream";

    pub fn encode(event: &ChatEvent) -> String {
        // Compact JSON never contains a raw newline, so one data line suffices
        format!("event: {}\ndata: {}\n\n", event.event_type(), event.data())
    }

    /// Parses one block back into `(type, data)`; `None` if it is not a complete block.
    pub fn decode(block: &str) -> Option<(String, Value)> {
        let mut event_type = None;
        let mut data = None;
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event_type = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = serde_json::from_str(rest.trim()).ok();
            }
        }
        Some((event_type?, data?))
    }

    /// Splits a concatenated stream into decoded blocks.
    pub fn decode_all(stream: &str) -> Vec<(String, Value)> {
        stream
            .split("\n\n")
            .filter(|b| !b.trim().is_empty())
            .filter_map(Self::decode)
            .collect()
    }
}
