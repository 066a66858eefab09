use super::route::{InferenceRoute, McpTransport};
use crate::core::conversations::{Agent, AiModel, KnowledgeBase, McpTool};
use crate::core::session::WebhookContext;
use serde::Serialize;
use serde_json::{Map, Value};

/// Per-agent model configuration sent with every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentConfig {
    pub api_key: String,
    pub api_version: String,
    pub base_url: String,
    pub credentials: String,
    pub proxy_url: String,
    pub prompt: String,
    pub spicy_level: i64,
    /// Omitted for thinking models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl AgentConfig {
    pub fn new(agent: &Agent, model: &AiModel) -> Self {
        Self {
            api_key: model.api_key.clone(),
            api_version: String::new(),
            base_url: model.base_url.clone(),
            credentials: String::new(),
            proxy_url: model.proxy_url.clone(),
            prompt: agent.prompt.clone(),
            spicy_level: 0,
            temperature: (!model.is_thinking).then_some(model.temperature),
        }
    }
}

/// One retrieval source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RagEntry {
    pub api_key: String,
    pub model: String,
    pub provider: String,
    pub proxy_url: String,
    pub knowledge_base: Vec<String>,
}

impl From<&KnowledgeBase> for RagEntry {
    fn from(kb: &KnowledgeBase) -> Self {
        Self {
            api_key: kb.api_key.clone(),
            model: kb.embedding_model.clone(),
            provider: kb.provider.clone(),
            proxy_url: kb.proxy_url.clone(),
            knowledge_base: vec![kb.name.clone()],
        }
    }
}

/// JSON body of the streaming inference call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub message: String,
    pub provider: String,
    pub model: String,
    pub thread_id: String,
    pub user_id: String,
    pub agent_config: AgentConfig,
    pub stream_tokens: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_config: Option<Vec<RagEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<Map<String, Value>>,
}

/// Tool config object with its transport normalized.
pub fn mcp_entry(tool: &McpTool) -> Value {
    let mut config = match &tool.config {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    config.insert(
        "transport".into(),
        Value::String(McpTransport::from_code(tool.config_type).to_string()),
    );
    Value::Object(config)
}

/// Everything needed to assemble one inference call.
pub struct RequestInputs<'a> {
    pub agent: &'a Agent,
    pub model: &'a AiModel,
    pub knowledge_bases: &'a [KnowledgeBase],
    pub tools: &'a [McpTool],
    pub default_tool: Option<&'a McpTool>,
    pub context: &'a WebhookContext,
    pub message: String,
}

pub fn build_request(inputs: RequestInputs<'_>) -> (InferenceRoute, InferenceRequest) {
    let rag_config: Vec<RagEntry> = inputs.knowledge_bases.iter().map(RagEntry::from).collect();

    let mut mcp_config = Map::new();
    for tool in inputs.tools.iter().chain(inputs.default_tool) {
        mcp_config.insert(tool.mcp_name.clone(), mcp_entry(tool));
    }

    let route = InferenceRoute::select(!rag_config.is_empty(), !mcp_config.is_empty());
    let request = InferenceRequest {
        message: inputs.message,
        provider: inputs.model.provider.clone(),
        model: inputs.model.model_name.clone(),
        thread_id: inputs.context.thread_id(),
        user_id: inputs.context.user_key(),
        agent_config: AgentConfig::new(inputs.agent, inputs.model),
        stream_tokens: true,
        rag_config: (!rag_config.is_empty()).then_some(rag_config),
        mcp_config: (!mcp_config.is_empty()).then_some(mcp_config),
    };
    (route, request)
}
