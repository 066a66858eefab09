use serde::{Deserialize, Serialize};

/// Envelope every chat-platform API response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub ret: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Body of `dialog/msg/sendtext`. Also used to update an existing message
/// when `update_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendTextRequest {
    pub dialog_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_type: Option<String>,
    pub silence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mark: Option<String>,
}

impl SendTextRequest {
    /// Silent plain-text notice.
    pub fn notice(dialog_id: i64, text: impl Into<String>) -> Self {
        Self {
            dialog_id,
            text: text.into(),
            silence: true,
            ..Self::default()
        }
    }

    /// The `...` reply a stream later fills in.
    pub fn placeholder(dialog_id: i64, reply_to: i64) -> Self {
        Self {
            dialog_id,
            text: "...".into(),
            text_type: Some("md".into()),
            silence: true,
            reply_id: Some(reply_to),
            reply_check: Some("yes".into()),
            ..Self::default()
        }
    }

    /// Replace the text of message `send_id` without marking it edited.
    pub fn update(dialog_id: i64, send_id: i64, text: impl Into<String>) -> Self {
        Self {
            dialog_id,
            text: text.into(),
            text_type: Some("md".into()),
            silence: true,
            update_id: Some(send_id),
            update_mark: Some("no".into()),
            ..Self::default()
        }
    }
}

/// The message the platform created in reply to `sendtext`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub dialog_id: i64,
    #[serde(default)]
    pub dialog_type: String,
    #[serde(default, alias = "userid")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamNotice<'a> {
    pub userid: i64,
    pub stream_url: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageBody {
    #[serde(default, alias = "Text")]
    pub text: String,
    #[serde(default, rename = "type", alias = "Type")]
    pub text_type: Option<String>,
}

/// One entry of a dialog's message history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DialogMessage {
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "type", alias = "Type")]
    pub kind: String,
    #[serde(default, alias = "Msg")]
    pub msg: MessageBody,
}

impl DialogMessage {
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    pub fn is_markdown(&self) -> bool {
        self.msg.text_type.as_deref() == Some("md")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageList {
    #[serde(default, alias = "List")]
    pub list: Vec<DialogMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertedMessage {
    #[serde(default)]
    pub msg: String,
}
