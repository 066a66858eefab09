use crate::core::invoker::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Downstream inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Explicit service URL. When unset the service is assumed on localhost
    /// at `service_port`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    /// Longest silence tolerated between two body chunks.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_service_port() -> u16 {
    8001
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(1000)
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            service_port: default_service_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl InferenceConfig {
    pub fn endpoint(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.service_port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
