use bytes::Bytes;
use uuid::Uuid;

use spotlight_core::event::CanonicalEvent;

/// Comment frame written when the stream has been idle for a keepalive
/// interval. Carries no id.
pub const KEEPALIVE_FRAME: &str = ": keep-alive\n\n";

/// One server-sent event as it goes on the wire.
#[derive(Debug, Clone)]
pub struct WireFrame {
    pub id: String,
    pub event: &'static str,
    pub data: serde_json::Value,
}

impl WireFrame {
    pub fn from_event(event: &CanonicalEvent, trace_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event: event.event_name(),
            data: event.to_payload(trace_id),
        }
    }

    /// `id: …\nevent: …\ndata: …\n\n`. The JSON is compact, so `data`
    /// always fits on one line.
    pub fn encode(&self) -> Bytes {
        Bytes::from(format!(
            "id: {}\nevent: {}\ndata: {}\n\n",
            self.id, self.event, self.data
        ))
    }
}

pub fn keepalive() -> Bytes {
    Bytes::from_static(KEEPALIVE_FRAME.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotlight_core::event::{FinishReason, Usage};

    #[test]
    fn test_encode_layout() {
        let frame = WireFrame::from_event(&CanonicalEvent::chunk("line one\nline two"), "trace-1");
        let text = String::from_utf8(frame.encode().to_vec()).unwrap();

        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("id: "));
        assert!(Uuid::parse_str(&lines[0][4..]).is_ok());
        assert_eq!(lines[1], "event: message_chunk");
        assert!(lines[2].starts_with("data: "));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "");

        let data: serde_json::Value = serde_json::from_str(&lines[2][6..]).unwrap();
        assert_eq!(data["content"], "line one\nline two");
        assert_eq!(data["trace_id"], "trace-1");
    }

    #[test]
    fn test_done_payload() {
        let event = CanonicalEvent::Done {
            usage: Usage::new(12, 3),
            finish_reason: FinishReason::Stop,
        };
        let frame = WireFrame::from_event(&event, "t");
        assert_eq!(frame.event, "done");
        assert_eq!(
            frame.data,
            serde_json::json!({
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15},
                "finish_reason": "stop",
                "trace_id": "t"
            })
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let a = WireFrame::from_event(&CanonicalEvent::thinking("x"), "t");
        let b = WireFrame::from_event(&CanonicalEvent::thinking("x"), "t");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_keepalive_is_comment() {
        assert_eq!(&keepalive()[..], b": keep-alive\n\n");
    }
}
