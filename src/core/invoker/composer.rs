use crate::core::session::WebhookContext;
use crate::error::InferenceError;
use crate::transport::channels::ChatPlatform;
use crate::utils::html::html_to_markdown;

const OBJECT_TAGS: [&str; 4] = ["<!--task", "<!--path", "<!--report", "<!--file"];
const REMOTE_URL_PLACEHOLDER: &str = "{{RemoteURL}}";

/// Messages of dialog history fetched for a group run.
pub const GROUP_HISTORY_TAKE: usize = 10;
/// Newest group messages eligible for object-tag conversion.
pub const GROUP_TAG_LOOKBACK: usize = 2;

pub fn contains_object_tags(text: &str) -> bool {
    OBJECT_TAGS.iter().any(|tag| text.contains(tag))
}

/// Build the user message text sent to the inference service.
pub async fn compose_user_message(
    platform: &dyn ChatPlatform,
    context: &WebhookContext,
) -> Result<String, InferenceError> {
    let text = if context.is_group() {
        group_history(platform, context.dialog_id).await
    } else {
        direct_message(platform, context).await
    };

    let text = text.replace(REMOTE_URL_PLACEHOLDER, context.base_url.trim_end_matches('/'));
    if text.trim().is_empty() {
        return Err(InferenceError::EmptyMessage);
    }
    Ok(text)
}

async fn direct_message(platform: &dyn ChatPlatform, context: &WebhookContext) -> String {
    if !context.reply_text.is_empty() {
        return format!(
            "<quoted_content>\n{}\n</quoted_content>\n\n{}",
            context.reply_text, context.text
        );
    }
    if contains_object_tags(&context.text) {
        return convert_or_keep(platform, &context.text).await;
    }
    context.text.clone()
}

async fn group_history(platform: &dyn ChatPlatform, dialog_id: i64) -> String {
    let messages = match platform.recent_messages(dialog_id, GROUP_HISTORY_TAKE).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(dialog_id, "failed to fetch group history: {e}");
            return String::new();
        }
    };

    // Newest first from the platform; position < lookback marks the newest.
    let mut parts = Vec::with_capacity(messages.len());
    for (position, message) in messages.iter().enumerate().rev() {
        if !message.is_text() {
            continue;
        }
        let raw = &message.msg.text;
        let text = if position < GROUP_TAG_LOOKBACK && contains_object_tags(raw) {
            convert_or_keep(platform, raw).await
        } else if message.is_markdown() {
            raw.clone()
        } else {
            html_to_markdown(raw)
        };
        parts.push(text);
    }

    let mut out = String::new();
    for part in parts {
        out.push_str(&part);
        out.push_str("\n\n");
    }
    out
}

async fn convert_or_keep(platform: &dyn ChatPlatform, text: &str) -> String {
    match platform.convert_for_ai(text).await {
        Ok(converted) if !converted.is_empty() => converted,
        Ok(_) => text.to_string(),
        Err(e) => {
            tracing::warn!("object tag conversion failed, keeping original text: {e}");
            text.to_string()
        }
    }
}
