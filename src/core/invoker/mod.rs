//! Inference invoker: resolves the agent behind a webhook, assembles the
//! request for the inference service and opens its event stream.

mod client;
mod composer;
mod request;
mod route;

pub use client::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, InferenceClient};
pub use composer::{
    GROUP_HISTORY_TAKE, GROUP_TAG_LOOKBACK, compose_user_message, contains_object_tags,
};
pub use request::{
    AgentConfig, InferenceRequest, RagEntry, RequestInputs, build_request, mcp_entry,
};
pub use route::{InferenceRoute, McpTransport};

use crate::core::conversations::{Agent, ChatStore, DEFAULT_TOOL_MCP_NAME, McpTool};
use crate::core::session::WebhookContext;
use crate::error::{RelayError, SetupError};
use crate::transport::channels::ChatPlatform;

/// A resolved run, ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub agent: Agent,
    pub route: InferenceRoute,
    pub request: InferenceRequest,
}

/// Resolve the active agent for a bot account.
pub async fn resolve_agent(store: &dyn ChatStore, bot_id: i64) -> Result<Agent, RelayError> {
    let agent = store
        .agent_by_bot(bot_id)
        .await?
        .ok_or(SetupError::AgentNotFound { bot_id })?;
    if !agent.is_active {
        return Err(SetupError::AgentDisabled { agent_id: agent.id }.into());
    }
    Ok(agent)
}

/// Look up the agent, its model and resources, and build the request.
pub async fn prepare_run(
    store: &dyn ChatStore,
    platform: &dyn ChatPlatform,
    context: &WebhookContext,
) -> Result<PreparedRun, RelayError> {
    let agent = resolve_agent(store, context.bot_uid).await?;

    let model_id = agent
        .ai_model_id
        .ok_or(SetupError::ModelNotFound { agent_id: agent.id })?;
    let model = store
        .ai_model(model_id)
        .await?
        .ok_or(SetupError::ModelNotFound { agent_id: agent.id })?;
    if !model.is_enabled {
        return Err(SetupError::ModelDisabled { model_id }.into());
    }

    let knowledge_bases = store.active_knowledge_bases(&agent.knowledge_bases).await?;
    let tools = store.active_mcp_tools(&agent.tools).await?;
    let default_tool = default_tool_for(store, &context.user_key()).await;

    let message = compose_user_message(platform, context).await?;

    let (route, request) = build_request(RequestInputs {
        agent: &agent,
        model: &model,
        knowledge_bases: &knowledge_bases,
        tools: &tools,
        default_tool: default_tool.as_ref(),
        context,
        message,
    });

    tracing::debug!(
        agent_id = agent.id,
        route = %route,
        knowledge_bases = knowledge_bases.len(),
        tools = tools.len(),
        default_tool = default_tool.is_some(),
        "prepared inference run"
    );

    Ok(PreparedRun {
        agent,
        route,
        request,
    })
}

/// The platform default tool, unless missing, inactive, or opted out of.
/// Lookup failures just leave the tool out.
async fn default_tool_for(store: &dyn ChatStore, user_id: &str) -> Option<McpTool> {
    match store.default_tool_disabled(user_id).await {
        Ok(true) => return None,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(user_id, "failed to read default tool preference: {e:#}");
            return None;
        }
    }
    match store.mcp_tool_by_mcp_name(DEFAULT_TOOL_MCP_NAME).await {
        Ok(tool) => tool.filter(|tool| tool.is_active),
        Err(e) => {
            tracing::warn!("failed to look up default tool: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversations::{NewAgent, NewAiModel, NewMcpTool, SqliteChatStore};
    use crate::transport::channels::DooTaskConnector;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteChatStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteChatStore::new(pool).await.unwrap()
    }

    async fn seed(store: &SqliteChatStore, agent_active: bool, model_enabled: bool) {
        let model_id = store
            .insert_ai_model(&NewAiModel {
                name: "m".into(),
                provider: "openai".into(),
                model_name: "gpt-4o".into(),
                temperature: 0.5,
                is_enabled: model_enabled,
                ..NewAiModel::default()
            })
            .await
            .unwrap();
        store
            .insert_agent(&NewAgent {
                name: "helper".into(),
                bot_id: 1001,
                user_id: 1,
                ai_model_id: Some(model_id),
                is_active: agent_active,
                ..NewAgent::default()
            })
            .await
            .unwrap();
    }

    fn context() -> WebhookContext {
        WebhookContext {
            dialog_id: 9,
            session_id: 1,
            dialog_type: "user".into(),
            msg_uid: 42,
            bot_uid: 1001,
            text: "hello".into(),
            ..WebhookContext::default()
        }
    }

    // Direct dialogs without tags never reach the platform.
    fn platform() -> std::sync::Arc<dyn ChatPlatform> {
        use crate::transport::channels::PlatformConnector;
        DooTaskConnector::new("http://127.0.0.1:9")
            .unwrap()
            .connect("t")
    }

    #[tokio::test]
    async fn unknown_bot_is_a_setup_error() {
        let store = store().await;
        let err = prepare_run(&store, platform().as_ref(), &context())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Setup(SetupError::AgentNotFound { bot_id: 1001 })
        ));
    }

    #[tokio::test]
    async fn disabled_agent_and_model_are_setup_errors() {
        let store = store().await;
        seed(&store, false, true).await;
        let err = prepare_run(&store, platform().as_ref(), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Setup(SetupError::AgentDisabled { .. })));

        let store = self::store().await;
        seed(&store, true, false).await;
        let err = prepare_run(&store, platform().as_ref(), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Setup(SetupError::ModelDisabled { .. })));
    }

    #[tokio::test]
    async fn default_tool_is_injected_unless_opted_out() {
        let store = store().await;
        seed(&store, true, true).await;
        store
            .create_mcp_tool_if_absent(&NewMcpTool {
                name: "dootask-mcp".into(),
                mcp_name: DEFAULT_TOOL_MCP_NAME.into(),
                category: "dootask".into(),
                config: json!({"url": "http://nginx/apps/mcp_server/mcp"}),
                is_active: true,
                ..NewMcpTool::default()
            })
            .await
            .unwrap();

        let run = prepare_run(&store, platform().as_ref(), &context())
            .await
            .unwrap();
        assert_eq!(run.route, InferenceRoute::Mcp);
        assert!(
            run.request
                .mcp_config
                .as_ref()
                .unwrap()
                .contains_key(DEFAULT_TOOL_MCP_NAME)
        );

        store.set_default_tool_disabled("42", true).await.unwrap();
        let run = prepare_run(&store, platform().as_ref(), &context())
            .await
            .unwrap();
        assert_eq!(run.route, InferenceRoute::Plain);
        assert!(run.request.mcp_config.is_none());
    }
}
