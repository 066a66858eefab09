use crate::core::buffer::BufferTtls;
use crate::core::relay::RelaySettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream buffer, ingestion and relay timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Token compression window.
    #[serde(default = "default_compression_interval_ms")]
    pub compression_interval_ms: u64,
    #[serde(default = "default_idle_notice_secs")]
    pub idle_notice_secs: u64,
    /// Lifetime of a single relay connection.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
    #[serde(default = "default_log_ttl_secs")]
    pub log_ttl_secs: u64,
}

fn default_compression_interval_ms() -> u64 {
    100
}

fn default_idle_notice_secs() -> u64 {
    5
}

fn default_deadline_secs() -> u64 {
    300
}

fn default_session_ttl_secs() -> u64 {
    600
}

fn default_claim_ttl_secs() -> u64 {
    180
}

fn default_log_ttl_secs() -> u64 {
    600
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            compression_interval_ms: default_compression_interval_ms(),
            idle_notice_secs: default_idle_notice_secs(),
            deadline_secs: default_deadline_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            claim_ttl_secs: default_claim_ttl_secs(),
            log_ttl_secs: default_log_ttl_secs(),
        }
    }
}

impl StreamConfig {
    pub fn compression_interval(&self) -> Duration {
        Duration::from_millis(self.compression_interval_ms)
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            idle_notice: Duration::from_secs(self.idle_notice_secs),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }

    pub fn buffer_ttls(&self) -> BufferTtls {
        BufferTtls {
            session: Duration::from_secs(self.session_ttl_secs),
            claim: Duration::from_secs(self.claim_ttl_secs),
            log: Duration::from_secs(self.log_ttl_secs),
        }
    }
}
