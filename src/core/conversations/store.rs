use super::types::{
    Agent, AiModel, ChatMessage, Conversation, KnowledgeBase, McpTool, MessageRole, MessageStatus,
    NewAgent, NewAiModel, NewKnowledgeBase, NewMcpTool, NewMessage,
};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Relational store for agents, their resources, conversations and messages.
pub trait ChatStore: Send + Sync {
    fn agent_by_bot(&self, bot_id: i64) -> StoreFuture<'_, Option<Agent>>;

    fn ai_model(&self, id: i64) -> StoreFuture<'_, Option<AiModel>>;

    fn active_knowledge_bases<'a>(&'a self, ids: &'a [i64])
    -> StoreFuture<'a, Vec<KnowledgeBase>>;

    fn active_mcp_tools<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<McpTool>>;

    fn mcp_tool_by_mcp_name<'a>(&'a self, mcp_name: &'a str) -> StoreFuture<'a, Option<McpTool>>;

    /// Insert unless a tool with the same mcp name exists. Returns whether a
    /// row was written.
    fn create_mcp_tool_if_absent<'a>(&'a self, tool: &'a NewMcpTool) -> StoreFuture<'a, bool>;

    fn default_tool_disabled<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, bool>;

    fn set_default_tool_disabled<'a>(
        &'a self,
        user_id: &'a str,
        disabled: bool,
    ) -> StoreFuture<'a, ()>;

    fn find_conversation<'a>(
        &'a self,
        agent_id: i64,
        user_id: &'a str,
        dialog_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>>;

    fn find_or_create_conversation<'a>(
        &'a self,
        agent_id: i64,
        user_id: &'a str,
        dialog_id: &'a str,
    ) -> StoreFuture<'a, Conversation>;

    fn insert_message<'a>(&'a self, message: &'a NewMessage) -> StoreFuture<'a, i64>;

    /// Set the token count of the user message paired with `send_id`.
    fn update_user_message_tokens(
        &self,
        conversation_id: i64,
        send_id: i64,
        tokens: i64,
    ) -> StoreFuture<'_, u64>;

    fn messages_for_conversation(&self, conversation_id: i64)
    -> StoreFuture<'_, Vec<ChatMessage>>;
}

/// SQLite-backed [`ChatStore`] using an sqlx pool.
pub struct SqliteChatStore {
    pool: SqlitePool,
}

const CHAT_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS chat_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const CHAT_SCHEMA_VERSION_KEY: &str = "chat_schema_version";
const CHAT_SCHEMA_VERSION: u32 = 1;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS ai_models (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         name TEXT NOT NULL,
         provider TEXT NOT NULL,
         model_name TEXT NOT NULL,
         api_key TEXT NOT NULL DEFAULT '',
         base_url TEXT NOT NULL DEFAULT '',
         proxy_url TEXT NOT NULL DEFAULT '',
         temperature REAL NOT NULL DEFAULT 0.7,
         is_thinking INTEGER NOT NULL DEFAULT 0,
         is_enabled INTEGER NOT NULL DEFAULT 1,
         created_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS agents (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         name TEXT NOT NULL,
         bot_id INTEGER NOT NULL UNIQUE,
         user_id INTEGER NOT NULL DEFAULT 0,
         prompt TEXT NOT NULL DEFAULT '',
         ai_model_id INTEGER REFERENCES ai_models(id) ON DELETE SET NULL,
         knowledge_bases TEXT NOT NULL DEFAULT '[]',
         tools TEXT NOT NULL DEFAULT '[]',
         is_active INTEGER NOT NULL DEFAULT 1,
         created_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS knowledge_bases (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         name TEXT NOT NULL,
         provider TEXT NOT NULL DEFAULT '',
         embedding_model TEXT NOT NULL DEFAULT '',
         api_key TEXT NOT NULL DEFAULT '',
         proxy_url TEXT NOT NULL DEFAULT '',
         is_active INTEGER NOT NULL DEFAULT 1,
         created_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS mcp_tools (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         user_id INTEGER NOT NULL DEFAULT 0,
         name TEXT NOT NULL,
         mcp_name TEXT NOT NULL UNIQUE,
         description TEXT,
         category TEXT NOT NULL DEFAULT '',
         config_type INTEGER NOT NULL DEFAULT 0,
         config TEXT NOT NULL DEFAULT '{}',
         is_active INTEGER NOT NULL DEFAULT 1,
         created_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS conversations (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         agent_id INTEGER NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
         dootask_chat_id TEXT NOT NULL,
         dootask_user_id TEXT NOT NULL,
         is_active INTEGER NOT NULL DEFAULT 1,
         created_at TEXT NOT NULL,
         UNIQUE(agent_id, dootask_chat_id, dootask_user_id)
     )",
    "CREATE TABLE IF NOT EXISTS messages (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
         send_id INTEGER NOT NULL DEFAULT 0,
         role TEXT NOT NULL,
         content TEXT NOT NULL,
         status TEXT NOT NULL DEFAULT 'pending',
         tokens_used INTEGER NOT NULL DEFAULT 0,
         response_time_ms INTEGER,
         mcp_used TEXT,
         created_at TEXT NOT NULL
     )",
    "CREATE INDEX IF NOT EXISTS idx_messages_pairing
         ON messages(conversation_id, role, send_id)",
    "CREATE TABLE IF NOT EXISTS user_settings (
         user_id TEXT PRIMARY KEY,
         default_tool_disabled INTEGER NOT NULL DEFAULT 0,
         updated_at TEXT NOT NULL
     )",
];

async fn ensure_chat_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CHAT_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create chat_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM chat_schema_meta WHERE key = $1")
            .bind(CHAT_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load chat schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid chat schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == CHAT_SCHEMA_VERSION,
            "incompatible chat schema version: stored={parsed}, expected={CHAT_SCHEMA_VERSION}"
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO chat_schema_meta (key, value) VALUES ($1, $2)")
        .bind(CHAT_SCHEMA_VERSION_KEY)
        .bind(CHAT_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist chat schema version")?;

    Ok(())
}

impl SqliteChatStore {
    /// Create a new store with an existing pool and create the schema.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        ensure_chat_schema_version(&pool).await?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("create chat schema")?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_ai_model(&self, model: &NewAiModel) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO ai_models
                 (name, provider, model_name, api_key, base_url, proxy_url,
                  temperature, is_thinking, is_enabled, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&model.name)
        .bind(&model.provider)
        .bind(&model.model_name)
        .bind(&model.api_key)
        .bind(&model.base_url)
        .bind(&model.proxy_url)
        .bind(model.temperature)
        .bind(model.is_thinking)
        .bind(model.is_enabled)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("insert ai model")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_agent(&self, agent: &NewAgent) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO agents
                 (name, bot_id, user_id, prompt, ai_model_id, knowledge_bases, tools,
                  is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&agent.name)
        .bind(agent.bot_id)
        .bind(agent.user_id)
        .bind(&agent.prompt)
        .bind(agent.ai_model_id)
        .bind(serde_json::to_string(&agent.knowledge_bases)?)
        .bind(serde_json::to_string(&agent.tools)?)
        .bind(agent.is_active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("insert agent")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_knowledge_base(&self, kb: &NewKnowledgeBase) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO knowledge_bases
                 (name, provider, embedding_model, api_key, proxy_url, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&kb.name)
        .bind(&kb.provider)
        .bind(&kb.embedding_model)
        .bind(&kb.api_key)
        .bind(&kb.proxy_url)
        .bind(kb.is_active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("insert knowledge base")?;
        Ok(result.last_insert_rowid())
    }
}

fn id_list(raw: &str) -> Vec<i64> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn map_agent_row(row: &SqliteRow) -> Result<Agent> {
    let knowledge_bases: String = row.try_get("knowledge_bases")?;
    let tools: String = row.try_get("tools")?;
    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        bot_id: row.try_get("bot_id")?,
        user_id: row.try_get("user_id")?,
        prompt: row.try_get("prompt")?,
        ai_model_id: row.try_get("ai_model_id")?,
        knowledge_bases: id_list(&knowledge_bases),
        tools: id_list(&tools),
        is_active: row.try_get("is_active")?,
    })
}

fn map_ai_model_row(row: &SqliteRow) -> Result<AiModel> {
    Ok(AiModel {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        model_name: row.try_get("model_name")?,
        api_key: row.try_get("api_key")?,
        base_url: row.try_get("base_url")?,
        proxy_url: row.try_get("proxy_url")?,
        temperature: row.try_get("temperature")?,
        is_thinking: row.try_get("is_thinking")?,
        is_enabled: row.try_get("is_enabled")?,
    })
}

fn map_knowledge_base_row(row: &SqliteRow) -> Result<KnowledgeBase> {
    Ok(KnowledgeBase {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        embedding_model: row.try_get("embedding_model")?,
        api_key: row.try_get("api_key")?,
        proxy_url: row.try_get("proxy_url")?,
        is_active: row.try_get("is_active")?,
    })
}

fn map_mcp_tool_row(row: &SqliteRow) -> Result<McpTool> {
    let config_raw: String = row.try_get("config")?;
    Ok(McpTool {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        mcp_name: row.try_get("mcp_name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        config_type: row.try_get("config_type")?,
        config: serde_json::from_str(&config_raw).context("deserialize mcp tool config")?,
        is_active: row.try_get("is_active")?,
    })
}

fn map_conversation_row(row: &SqliteRow) -> Result<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        dootask_chat_id: row.try_get("dootask_chat_id")?,
        dootask_user_id: row.try_get("dootask_user_id")?,
        is_active: row.try_get("is_active")?,
    })
}

fn map_message_row(row: &SqliteRow) -> Result<ChatMessage> {
    let role_raw: String = row.try_get("role")?;
    let status_raw: String = row.try_get("status")?;
    let mcp_used_raw: Option<String> = row.try_get("mcp_used")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        send_id: row.try_get("send_id")?,
        role: MessageRole::from_str(&role_raw)
            .with_context(|| format!("unknown message role: {role_raw}"))?,
        content: row.try_get("content")?,
        status: MessageStatus::from_str(&status_raw)
            .with_context(|| format!("unknown message status: {status_raw}"))?,
        tokens_used: row.try_get("tokens_used")?,
        response_time_ms: row.try_get("response_time_ms")?,
        mcp_used: mcp_used_raw
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .context("deserialize mcp_used")?,
        created_at: row.try_get("created_at")?,
    })
}

const AGENT_COLUMNS: &str =
    "id, name, bot_id, user_id, prompt, ai_model_id, knowledge_bases, tools, is_active";
const MCP_TOOL_COLUMNS: &str =
    "id, user_id, name, mcp_name, description, category, config_type, config, is_active";

impl ChatStore for SqliteChatStore {
    fn agent_by_bot(&self, bot_id: i64) -> StoreFuture<'_, Option<Agent>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {AGENT_COLUMNS} FROM agents WHERE bot_id = $1"
            ))
            .bind(bot_id)
            .fetch_optional(&self.pool)
            .await
            .context("query agent by bot id")?;
            row.map(|r| map_agent_row(&r)).transpose()
        })
    }

    fn ai_model(&self, id: i64) -> StoreFuture<'_, Option<AiModel>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, name, provider, model_name, api_key, base_url, proxy_url,
                        temperature, is_thinking, is_enabled
                 FROM ai_models WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("query ai model")?;
            row.map(|r| map_ai_model_row(&r)).transpose()
        })
    }

    fn active_knowledge_bases<'a>(
        &'a self,
        ids: &'a [i64],
    ) -> StoreFuture<'a, Vec<KnowledgeBase>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let rows = sqlx::query(
                "SELECT id, name, provider, embedding_model, api_key, proxy_url, is_active
                 FROM knowledge_bases
                 WHERE is_active = 1 AND id IN (SELECT value FROM json_each($1))
                 ORDER BY id",
            )
            .bind(serde_json::to_string(ids)?)
            .fetch_all(&self.pool)
            .await
            .context("query active knowledge bases")?;
            rows.iter().map(map_knowledge_base_row).collect()
        })
    }

    fn active_mcp_tools<'a>(&'a self, ids: &'a [i64]) -> StoreFuture<'a, Vec<McpTool>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let rows = sqlx::query(&format!(
                "SELECT {MCP_TOOL_COLUMNS} FROM mcp_tools
                 WHERE is_active = 1 AND id IN (SELECT value FROM json_each($1))
                 ORDER BY id"
            ))
            .bind(serde_json::to_string(ids)?)
            .fetch_all(&self.pool)
            .await
            .context("query active mcp tools")?;
            rows.iter().map(map_mcp_tool_row).collect()
        })
    }

    fn mcp_tool_by_mcp_name<'a>(&'a self, mcp_name: &'a str) -> StoreFuture<'a, Option<McpTool>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {MCP_TOOL_COLUMNS} FROM mcp_tools WHERE mcp_name = $1"
            ))
            .bind(mcp_name)
            .fetch_optional(&self.pool)
            .await
            .context("query mcp tool by mcp name")?;
            row.map(|r| map_mcp_tool_row(&r)).transpose()
        })
    }

    fn create_mcp_tool_if_absent<'a>(&'a self, tool: &'a NewMcpTool) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO mcp_tools
                     (user_id, name, mcp_name, description, category, config_type, config,
                      is_active, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT(mcp_name) DO NOTHING",
            )
            .bind(tool.user_id)
            .bind(&tool.name)
            .bind(&tool.mcp_name)
            .bind(tool.description.as_deref())
            .bind(&tool.category)
            .bind(tool.config_type)
            .bind(tool.config.to_string())
            .bind(tool.is_active)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("insert mcp tool if absent")?;
            Ok(result.rows_affected() == 1)
        })
    }

    fn default_tool_disabled<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let disabled: Option<(bool,)> = sqlx::query_as(
                "SELECT default_tool_disabled FROM user_settings WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("query user settings")?;
            Ok(disabled.is_some_and(|(flag,)| flag))
        })
    }

    fn set_default_tool_disabled<'a>(
        &'a self,
        user_id: &'a str,
        disabled: bool,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO user_settings (user_id, default_tool_disabled, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     default_tool_disabled = excluded.default_tool_disabled,
                     updated_at = excluded.updated_at",
            )
            .bind(user_id)
            .bind(disabled)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("upsert user settings")?;
            Ok(())
        })
    }

    fn find_conversation<'a>(
        &'a self,
        agent_id: i64,
        user_id: &'a str,
        dialog_id: &'a str,
    ) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, agent_id, dootask_chat_id, dootask_user_id, is_active
                 FROM conversations
                 WHERE agent_id = $1 AND dootask_user_id = $2 AND dootask_chat_id = $3",
            )
            .bind(agent_id)
            .bind(user_id)
            .bind(dialog_id)
            .fetch_optional(&self.pool)
            .await
            .context("query conversation")?;
            row.map(|r| map_conversation_row(&r)).transpose()
        })
    }

    fn find_or_create_conversation<'a>(
        &'a self,
        agent_id: i64,
        user_id: &'a str,
        dialog_id: &'a str,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO conversations
                     (agent_id, dootask_chat_id, dootask_user_id, is_active, created_at)
                 VALUES ($1, $2, $3, 1, $4)
                 ON CONFLICT(agent_id, dootask_chat_id, dootask_user_id) DO NOTHING",
            )
            .bind(agent_id)
            .bind(dialog_id)
            .bind(user_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("create conversation")?;

            self.find_conversation(agent_id, user_id, dialog_id)
                .await?
                .context("conversation missing after insert")
        })
    }

    fn insert_message<'a>(&'a self, message: &'a NewMessage) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            let mcp_used = message
                .mcp_used
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("serialize mcp_used")?;
            let result = sqlx::query(
                "INSERT INTO messages
                     (conversation_id, send_id, role, content, status, tokens_used,
                      response_time_ms, mcp_used, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(message.conversation_id)
            .bind(message.send_id)
            .bind(message.role.as_ref())
            .bind(&message.content)
            .bind(message.status.as_ref())
            .bind(message.tokens_used)
            .bind(message.response_time_ms)
            .bind(mcp_used)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("insert message")?;
            Ok(result.last_insert_rowid())
        })
    }

    fn update_user_message_tokens(
        &self,
        conversation_id: i64,
        send_id: i64,
        tokens: i64,
    ) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE messages SET tokens_used = $1
                 WHERE conversation_id = $2 AND role = 'user' AND send_id = $3",
            )
            .bind(tokens)
            .bind(conversation_id)
            .bind(send_id)
            .execute(&self.pool)
            .await
            .context("update user message tokens")?;
            Ok(result.rows_affected())
        })
    }

    fn messages_for_conversation(
        &self,
        conversation_id: i64,
    ) -> StoreFuture<'_, Vec<ChatMessage>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, conversation_id, send_id, role, content, status, tokens_used,
                        response_time_ms, mcp_used, created_at
                 FROM messages
                 WHERE conversation_id = $1
                 ORDER BY id",
            )
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await
            .context("query messages")?;
            rows.iter().map(map_message_row).collect()
        })
    }
}
