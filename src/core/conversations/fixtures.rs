//! Shared SQLite fixtures for unit tests.

use super::{NewAgent, NewAiModel, SqliteChatStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

pub const BOT_ID: i64 = 1001;

pub async fn memory_store() -> Arc<SqliteChatStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    Arc::new(SqliteChatStore::new(pool).await.unwrap())
}

/// An enabled model and an active agent bound to [`BOT_ID`]. Returns the agent id.
pub async fn seed_agent(store: &SqliteChatStore) -> i64 {
    let model_id = store
        .insert_ai_model(&NewAiModel {
            name: "m".into(),
            provider: "openai".into(),
            model_name: "gpt-4o".into(),
            is_enabled: true,
            ..NewAiModel::default()
        })
        .await
        .unwrap();
    store
        .insert_agent(&NewAgent {
            name: "helper".into(),
            bot_id: BOT_ID,
            user_id: 1,
            ai_model_id: Some(model_id),
            is_active: true,
            ..NewAgent::default()
        })
        .await
        .unwrap()
}
