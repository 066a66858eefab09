use rand::Rng;
use serde::{Deserialize, Serialize};

const STREAM_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const STREAM_ID_LEN: usize = 6;

/// Everything a run needs to know about the webhook that started it.
/// Immutable once stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookContext {
    pub dialog_id: i64,
    pub session_id: i64,
    pub dialog_type: String,
    pub msg_id: i64,
    /// Chat-platform id of the sender.
    pub msg_uid: i64,
    pub bot_uid: i64,
    /// Bot token for calls back into the chat platform.
    pub token: String,
    pub text: String,
    #[serde(default)]
    pub reply_text: String,
    #[serde(default)]
    pub extras: serde_json::Value,
    /// Id of the placeholder reply the stream updates.
    pub send_id: i64,
    /// Externally visible base URL of this service.
    pub base_url: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    "en".into()
}

/// Reduce a platform language tag (`zh-CN`, `en_US`) to a locale code.
pub fn normalize_lang(lang: &str) -> String {
    let code = lang
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if code.is_empty() { default_lang() } else { code }
}

impl WebhookContext {
    pub fn is_group(&self) -> bool {
        self.dialog_type == "group"
    }

    /// Conversation thread for the inference service; groups share none.
    pub fn thread_id(&self) -> String {
        if self.is_group() {
            String::new()
        } else {
            format!("{}_{}", self.dialog_id, self.session_id)
        }
    }

    pub fn user_key(&self) -> String {
        self.msg_uid.to_string()
    }

    pub fn dialog_key(&self) -> String {
        self.dialog_id.to_string()
    }
}

/// A stored stream: its id plus the webhook context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub stream_id: String,
    pub context: WebhookContext,
}

impl StreamSession {
    pub fn new(context: WebhookContext) -> Self {
        Self {
            stream_id: generate_stream_id(),
            context,
        }
    }

    pub fn stream_url(&self) -> String {
        format!(
            "{}/service/stream/{}",
            self.context.base_url.trim_end_matches('/'),
            self.stream_id
        )
    }
}

pub fn generate_stream_id() -> String {
    let mut rng = rand::rng();
    (0..STREAM_ID_LEN)
        .map(|_| char::from(STREAM_ID_ALPHABET[rng.random_range(0..STREAM_ID_ALPHABET.len())]))
        .collect()
}
