//! Assistant message accounting for one run.

use crate::core::conversations::{ChatStore, MessageRole, MessageStatus, NewMessage};
use crate::core::records::Usage;
use crate::core::session::WebhookContext;
use crate::error::PersistenceError;
use crate::utils::text::truncate_stored_content;
use std::sync::Arc;
use std::time::Instant;

/// Writes assistant messages for one run and pairs them with the user's
/// message by send id. Failures are logged; nothing here aborts a stream.
#[derive(Clone)]
pub struct MessageRecorder {
    store: Arc<dyn ChatStore>,
    agent_id: i64,
    user_id: String,
    dialog_id: String,
    send_id: i64,
    started: Instant,
}

impl MessageRecorder {
    pub fn new(store: Arc<dyn ChatStore>, agent_id: i64, context: &WebhookContext) -> Self {
        Self {
            store,
            agent_id,
            user_id: context.user_key(),
            dialog_id: context.dialog_key(),
            send_id: context.send_id,
            started: Instant::now(),
        }
    }

    pub async fn success(&self, content: &str, usage: Usage, mcp_used: Option<Vec<String>>) {
        self.record(content, MessageStatus::Success, usage, mcp_used)
            .await;
    }

    /// Failed reply: zero tokens on both sides.
    pub async fn failure(&self, content: &str) {
        self.record(content, MessageStatus::Failed, Usage::default(), None)
            .await;
    }

    async fn record(
        &self,
        content: &str,
        status: MessageStatus,
        usage: Usage,
        mcp_used: Option<Vec<String>>,
    ) {
        if let Err(e) = self.try_record(content, status, usage, mcp_used).await {
            tracing::warn!(
                agent_id = self.agent_id,
                send_id = self.send_id,
                "failed to persist assistant message: {e:#}"
            );
        }
    }

    async fn try_record(
        &self,
        content: &str,
        status: MessageStatus,
        usage: Usage,
        mcp_used: Option<Vec<String>>,
    ) -> anyhow::Result<()> {
        let conversation = self
            .store
            .find_conversation(self.agent_id, &self.user_id, &self.dialog_id)
            .await?
            .ok_or_else(|| PersistenceError::ConversationNotFound {
                agent_id: self.agent_id,
                user_id: self.user_id.clone(),
                dialog_id: self.dialog_id.clone(),
            })?;

        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let message = NewMessage {
            conversation_id: conversation.id,
            send_id: self.send_id,
            role: MessageRole::Assistant,
            content: truncate_stored_content(content),
            status,
            tokens_used: usage.output_tokens,
            response_time_ms: Some(elapsed),
            mcp_used,
        };
        self.store.insert_message(&message).await?;
        self.store
            .update_user_message_tokens(conversation.id, self.send_id, usage.input_tokens)
            .await?;
        Ok(())
    }
}
