use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the relay.
///
/// Each subsystem defines its own error family. The run driver matches on
/// these to decide which terminal record a reader sees; loaders and CLI glue
/// continue to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Run setup (agent / model resolution) ─────────────────────────────
    #[error("setup: {0}")]
    Setup(#[from] SetupError),

    // ── Inference service ────────────────────────────────────────────────
    #[error("inference: {0}")]
    Inference(#[from] InferenceError),

    // ── Stream store ─────────────────────────────────────────────────────
    #[error("stream store: {0}")]
    Store(#[from] StoreError),

    // ── Chat platform ────────────────────────────────────────────────────
    #[error("chat platform: {0}")]
    Platform(#[from] PlatformError),

    // ── Relational persistence ───────────────────────────────────────────
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Run setup errors ────────────────────────────────────────────────────────

/// Agent or model resolution failures. Terminal for a run, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("no agent is bound to bot {bot_id}")]
    AgentNotFound { bot_id: i64 },

    #[error("agent {agent_id} is disabled")]
    AgentDisabled { agent_id: i64 },

    #[error("agent {agent_id} has no usable AI model")]
    ModelNotFound { agent_id: i64 },

    #[error("AI model {model_id} is disabled")]
    ModelDisabled { model_id: i64 },
}

impl SetupError {
    /// Locale key of the notice shown to the chat user.
    pub fn notice_key(&self) -> &'static str {
        match self {
            Self::AgentNotFound { .. } => "agent.not_found",
            Self::AgentDisabled { .. } => "agent.disabled",
            Self::ModelNotFound { .. } => "agent.model_not_found",
            Self::ModelDisabled { .. } => "agent.model_disabled",
        }
    }
}

// ─── Inference service errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("http client setup failed: {0}")]
    Client(String),

    #[error("inference service unreachable after {attempts} attempt(s): {message}")]
    Connect { attempts: u32, message: String },

    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("composed user message is empty")]
    EmptyMessage,

    #[error("response body read failed: {0}")]
    Read(String),
}

// ─── Stream store errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("stream {0} already finished")]
    Finished(String),

    #[error("codec: {0}")]
    Codec(String),
}

// ─── Chat platform errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("{endpoint} rejected the call: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("http client setup failed: {0}")]
    Client(String),
}

// ─── Relational persistence errors ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("conversation not found for agent {agent_id}, user {user_id}, dialog {dialog_id}")]
    ConversationNotFound {
        agent_id: i64,
        user_id: String,
        dialog_id: String,
    },

    #[error("sqlx: {0}")]
    Sqlx(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Sqlx(err.to_string())
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RelayError>;
