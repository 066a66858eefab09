use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Literal log line marking the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Token accounting reported by the inference service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
}

/// Final assistant message as reported by the inference service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "usage_metadata")]
    pub usage: Usage,
}

/// One entry of a stream's durable log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    Token(String),
    Thinking(String),
    Tool(String),
    Message(MessageEnvelope),
    Error(String),
    Done,
}

#[derive(Serialize)]
struct EncodedRecord<'a, C: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    content: C,
}

#[derive(Deserialize)]
struct DecodedRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl StreamRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Thinking(_) => "thinking",
            Self::Tool(_) => "tool",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Done)
    }

    /// Encode as a single log line.
    pub fn encode(&self) -> String {
        let encoded = match self {
            Self::Done => return DONE_SENTINEL.to_string(),
            Self::Token(text) | Self::Thinking(text) | Self::Tool(text) | Self::Error(text) => {
                serde_json::to_string(&EncodedRecord {
                    kind: self.kind(),
                    content: text,
                })
            }
            Self::Message(envelope) => serde_json::to_string(&EncodedRecord {
                kind: self.kind(),
                content: envelope,
            }),
        };
        encoded.unwrap_or_else(|_| r#"{"type":"error","content":"record encoding failed"}"#.into())
    }

    /// Decode a log line. Lines that are not records (passthrough lines,
    /// unknown types, malformed content) yield `None`.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == DONE_SENTINEL {
            return Some(Self::Done);
        }
        let decoded: DecodedRecord = serde_json::from_str(line).ok()?;
        let text = || decoded.content.as_str().map(ToString::to_string);
        match decoded.kind.as_str() {
            "token" => text().map(Self::Token),
            "thinking" => text().map(Self::Thinking),
            "tool" => text().map(Self::Tool),
            "error" => text().map(Self::Error),
            "message" => serde_json::from_value::<MessageEnvelope>(decoded.content.clone())
                .ok()
                .map(Self::Message),
            _ => None,
        }
    }
}
