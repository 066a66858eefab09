use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DooTaskConfig {
    #[serde(default = "default_dootask_base_url")]
    pub base_url: String,
    /// Used when a webhook arrives without a bot token.
    #[serde(default)]
    pub bot_token: Option<String>,
}

fn default_dootask_base_url() -> String {
    "http://nginx".into()
}

impl Default for DooTaskConfig {
    fn default() -> Self {
        Self {
            base_url: default_dootask_base_url(),
            bot_token: None,
        }
    }
}

/// Built-in introspection tool kept registered by the reconciliation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mcp_url")]
    pub mcp_url: String,
    #[serde(default = "default_health_url")]
    pub health_url: String,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_mcp_url() -> String {
    "http://nginx/apps/mcp_server/mcp".into()
}

fn default_health_url() -> String {
    "http://nginx/apps/mcp_server/healthz".into()
}

fn default_check_interval_secs() -> u64 {
    600
}

fn default_health_timeout_secs() -> u64 {
    30
}

impl Default for DefaultToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mcp_url: default_mcp_url(),
            health_url: default_health_url(),
            check_interval_secs: default_check_interval_secs(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

impl DefaultToolConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tool_points_at_platform_mcp_server() {
        let config = DefaultToolConfig::default();
        assert!(config.enabled);
        assert!(config.health_url.ends_with("/healthz"));
        assert!(config.mcp_url.ends_with("/mcp"));
        assert_eq!(config.check_interval(), Duration::from_secs(600));
        assert_eq!(config.health_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn bot_token_is_optional_in_toml() {
        let decoded: DooTaskConfig = toml::from_str(r#"base_url = "http://dootask""#).unwrap();
        assert_eq!(decoded.base_url, "http://dootask");
        assert!(decoded.bot_token.is_none());
    }
}
