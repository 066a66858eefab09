use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// A chat-bot agent bound to one chat-platform bot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub bot_id: i64,
    /// Owner of the agent on the chat platform.
    pub user_id: i64,
    pub prompt: String,
    pub ai_model_id: Option<i64>,
    pub knowledge_bases: Vec<i64>,
    pub tools: Vec<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub bot_id: i64,
    pub user_id: i64,
    pub prompt: String,
    pub ai_model_id: Option<i64>,
    pub knowledge_bases: Vec<i64>,
    pub tools: Vec<i64>,
    pub is_active: bool,
}

/// Credentials and endpoint of one AI model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModel {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub model_name: String,
    pub api_key: String,
    pub base_url: String,
    pub proxy_url: String,
    pub temperature: f64,
    pub is_thinking: bool,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAiModel {
    pub name: String,
    pub provider: String,
    pub model_name: String,
    pub api_key: String,
    pub base_url: String,
    pub proxy_url: String,
    pub temperature: f64,
    pub is_thinking: bool,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub embedding_model: String,
    pub api_key: String,
    pub proxy_url: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewKnowledgeBase {
    pub name: String,
    pub provider: String,
    pub embedding_model: String,
    pub api_key: String,
    pub proxy_url: String,
    pub is_active: bool,
}

/// An external tool integration exposed to the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub mcp_name: String,
    pub description: Option<String>,
    pub category: String,
    /// Transport code, see [`crate::core::invoker::McpTransport`].
    pub config_type: i64,
    pub config: serde_json::Value,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMcpTool {
    pub user_id: i64,
    pub name: String,
    pub mcp_name: String,
    pub description: Option<String>,
    pub category: String,
    pub config_type: i64,
    pub config: serde_json::Value,
    pub is_active: bool,
}

/// Messages grouped by (agent, chat-platform user, chat-platform dialog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub agent_id: i64,
    pub dootask_chat_id: String,
    pub dootask_user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub send_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
    pub tokens_used: i64,
    pub response_time_ms: Option<i64>,
    pub mcp_used: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub send_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub status: MessageStatus,
    pub tokens_used: i64,
    pub response_time_ms: Option<i64>,
    pub mcp_used: Option<Vec<String>>,
    pub created_at: String,
}
