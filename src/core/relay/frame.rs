use serde::Serialize;
use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RelayEvent {
    Append,
    Replace,
    Done,
    Error,
}

/// One event written to a relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    /// Send id of the placeholder reply the reader updates.
    pub id: i64,
    pub event: RelayEvent,
    pub content: String,
}

#[derive(Serialize)]
struct FrameData<'a> {
    content: &'a str,
}

impl RelayFrame {
    pub fn new(id: i64, event: RelayEvent, content: impl Into<String>) -> Self {
        Self {
            id,
            event,
            content: content.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.event, RelayEvent::Done | RelayEvent::Error)
    }

    /// Wire form. JSON string encoding keeps the payload on one line.
    pub fn encode(&self) -> String {
        let data = serde_json::to_string(&FrameData {
            content: &self.content,
        })
        .unwrap_or_else(|_| r#"{"content":""}"#.to_string());
        format!("id: {}\nevent: {}\ndata: {data}\n\n", self.id, self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let frame = RelayFrame::new(77, RelayEvent::Append, "line one\nline \"two\"");
        assert_eq!(
            frame.encode(),
            "id: 77\nevent: append\ndata: {\"content\":\"line one\\nline \\\"two\\\"\"}\n\n"
        );
    }

    #[test]
    fn terminal_events() {
        assert!(RelayFrame::new(1, RelayEvent::Done, "").is_terminal());
        assert!(RelayFrame::new(1, RelayEvent::Error, "x").is_terminal());
        assert!(!RelayFrame::new(1, RelayEvent::Replace, "x").is_terminal());
        assert_eq!(RelayEvent::Replace.as_ref(), "replace");
    }
}
