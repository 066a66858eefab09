use crate::core::session::{WebhookContext, normalize_lang};
use serde::Deserialize;

/// Form body the chat platform posts for every bot message.
///
/// `msg_user` and `extras` arrive as JSON text inside the form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookForm {
    pub text: String,
    pub reply_text: String,
    pub token: String,
    pub session_id: i64,
    pub dialog_id: i64,
    pub dialog_type: String,
    pub msg_id: i64,
    pub msg_uid: i64,
    pub msg_user: String,
    pub mention: i64,
    pub bot_uid: i64,
    pub version: String,
    pub extras: String,
}

/// The sender as described by `msg_user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SenderProfile {
    pub userid: i64,
    pub email: String,
    pub nickname: String,
    pub profession: String,
    pub lang: String,
}

impl WebhookForm {
    /// Group messages that do not mention the bot are ignored.
    pub fn is_unaddressed_group(&self) -> bool {
        self.dialog_type == "group" && self.mention == 0
    }

    pub fn sender(&self) -> SenderProfile {
        if self.msg_user.trim().is_empty() {
            return SenderProfile::default();
        }
        serde_json::from_str(&self.msg_user).unwrap_or_else(|e| {
            tracing::debug!(msg_uid = self.msg_uid, "unreadable msg_user: {e}");
            SenderProfile::default()
        })
    }

    pub fn lang(&self) -> String {
        normalize_lang(&self.sender().lang)
    }

    pub fn extras_value(&self) -> serde_json::Value {
        if self.extras.trim().is_empty() {
            return serde_json::Value::Null;
        }
        serde_json::from_str(&self.extras)
            .unwrap_or_else(|_| serde_json::Value::String(self.extras.clone()))
    }

    /// Context stored with the stream once the placeholder reply exists.
    pub fn into_context(self, token: String, send_id: i64, base_url: String) -> WebhookContext {
        let lang = self.lang();
        let extras = self.extras_value();
        WebhookContext {
            dialog_id: self.dialog_id,
            session_id: self.session_id,
            dialog_type: self.dialog_type,
            msg_id: self.msg_id,
            msg_uid: self.msg_uid,
            bot_uid: self.bot_uid,
            token,
            text: self.text,
            reply_text: self.reply_text,
            extras,
            send_id,
            base_url,
            lang,
        }
    }
}
