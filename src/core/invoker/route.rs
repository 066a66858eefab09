use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Downstream endpoint a run is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InferenceRoute {
    Plain,
    Rag,
    Mcp,
    Supervisor,
}

impl InferenceRoute {
    pub fn select(uses_retrieval: bool, uses_tools: bool) -> Self {
        match (uses_retrieval, uses_tools) {
            (false, false) => Self::Plain,
            (true, false) => Self::Rag,
            (false, true) => Self::Mcp,
            (true, true) => Self::Supervisor,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Plain => "/stream",
            Self::Rag => "/rag_agent/stream",
            Self::Mcp => "/mcp_agent/stream",
            Self::Supervisor => "/supervisor_agent/stream",
        }
    }
}

/// Tool transport, stored as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum McpTransport {
    StreamableHttp,
    Websocket,
    Sse,
    Stdio,
}

impl McpTransport {
    /// Unknown codes fall back to streamable HTTP.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Websocket,
            2 => Self::Sse,
            3 => Self::Stdio,
            _ => Self::StreamableHttp,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::StreamableHttp => 0,
            Self::Websocket => 1,
            Self::Sse => 2,
            Self::Stdio => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_decision_table() {
        assert_eq!(InferenceRoute::select(false, false).path(), "/stream");
        assert_eq!(InferenceRoute::select(true, false).path(), "/rag_agent/stream");
        assert_eq!(InferenceRoute::select(false, true).path(), "/mcp_agent/stream");
        assert_eq!(
            InferenceRoute::select(true, true).path(),
            "/supervisor_agent/stream"
        );
    }

    #[test]
    fn transport_codes_normalize() {
        assert_eq!(McpTransport::from_code(0).as_ref(), "streamable_http");
        assert_eq!(McpTransport::from_code(1).as_ref(), "websocket");
        assert_eq!(McpTransport::from_code(2).as_ref(), "sse");
        assert_eq!(McpTransport::from_code(3).as_ref(), "stdio");
        assert_eq!(McpTransport::from_code(42), McpTransport::StreamableHttp);
        assert_eq!(McpTransport::from_code(-1).code(), 0);
    }
}
