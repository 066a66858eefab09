use crate::core::records::{DONE_SENTINEL, MessageEnvelope, Usage};
use serde::Deserialize;
use serde_json::Value;

/// Class of a compressible fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentClass {
    Token,
    Thinking,
    Tool,
}

/// One classified line of the inference event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Done,
    Fragment(FragmentClass, String),
    ToolCalls { names: Vec<String>, usage: Usage },
    Final(MessageEnvelope),
    Error(String),
    /// Recognised JSON of a shape the ingestor does not interpret.
    Passthrough(String),
    /// Empty, malformed, or deliberately ignored.
    Skip,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    usage_metadata: Usage,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    #[serde(default)]
    name: String,
}

pub fn parse_line(raw: &str) -> Frame {
    let line = raw.strip_prefix("data:").unwrap_or(raw).trim();
    if line.is_empty() {
        return Frame::Skip;
    }
    if line == DONE_SENTINEL {
        return Frame::Done;
    }
    let Ok(frame) = serde_json::from_str::<RawFrame>(line) else {
        return Frame::Skip;
    };
    if frame.content.is_null() || frame.content.as_str() == Some("") {
        return Frame::Skip;
    }

    match frame.kind.as_str() {
        "token" | "thinking" => {
            let class = if frame.kind == "token" {
                FragmentClass::Token
            } else {
                FragmentClass::Thinking
            };
            match frame.content {
                Value::String(text) => Frame::Fragment(class, text),
                _ => Frame::Skip,
            }
        }
        "message" => parse_message(line, frame.content),
        "error" => match frame.content {
            Value::String(text) => Frame::Error(parse_error_content(&text)),
            _ => Frame::Skip,
        },
        _ => Frame::Passthrough(line.to_string()),
    }
}

fn parse_message(line: &str, content: Value) -> Frame {
    let Ok(message) = serde_json::from_value::<MessageContent>(content.clone()) else {
        return Frame::Passthrough(line.to_string());
    };
    if message.kind == "tool" {
        return Frame::Skip;
    }
    if message.kind == "ai" && !message.tool_calls.is_empty() {
        return Frame::ToolCalls {
            names: message.tool_calls.into_iter().map(|call| call.name).collect(),
            usage: message.usage_metadata,
        };
    }
    match serde_json::from_value::<MessageEnvelope>(content) {
        Ok(envelope) => Frame::Final(envelope),
        Err(_) => Frame::Passthrough(line.to_string()),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pull the human-readable message out of an upstream error string.
///
/// Provider errors often look like
/// `Error code: 400 - {'error': {'message': '...', 'code': None}}`; the part
/// after the first ` - ` is coerced to JSON. Anything that does not parse, or
/// parses without a message, is returned unchanged.
pub fn parse_error_content(content: &str) -> String {
    let mut body = content;
    if let Some(start) = content.find("Error code:")
        && let Some(dash) = content[start..].find(" - ")
    {
        body = &content[start + dash + 3..];
    }
    let coerced = body.replace('\'', "\"").replace("None", "null");
    match serde_json::from_str::<ErrorBody>(&coerced) {
        Ok(parsed) if !parsed.error.message.trim().is_empty() => parsed.error.message,
        _ => content.to_string(),
    }
}
