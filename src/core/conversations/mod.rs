//! Relational state: agents, AI models, knowledge bases, tools,
//! conversations and messages.

#[cfg(test)]
pub(crate) mod fixtures;
mod store;
mod types;

pub use store::{ChatStore, SqliteChatStore};
pub use types::{
    Agent, AiModel, ChatMessage, Conversation, KnowledgeBase, McpTool, MessageRole,
    MessageStatus, NewAgent, NewAiModel, NewKnowledgeBase, NewMcpTool, NewMessage,
};

/// Display name of the platform's built-in introspection tool.
pub const DEFAULT_TOOL_NAME: &str = "dootask-mcp";
/// Unique tool key of the built-in introspection tool.
pub const DEFAULT_TOOL_MCP_NAME: &str = "dootaskmcp";
pub const DEFAULT_TOOL_CATEGORY: &str = "dootask";
