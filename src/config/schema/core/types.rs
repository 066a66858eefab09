use super::super::{
    DatabaseConfig, DefaultToolConfig, DooTaskConfig, GatewayConfig, InferenceConfig,
    StreamConfig,
};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(super) const DATA_DIR_NAME: &str = ".dootask-ai";
const DATABASE_FILE: &str = "dootask-ai.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the default database - not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub dootask: DooTaskConfig,

    #[serde(default)]
    pub default_tool: DefaultToolConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

pub(super) fn default_data_dir() -> PathBuf {
    let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
    home.join(DATA_DIR_NAME)
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            config_path: data_dir.join("config.toml"),
            data_dir,
            gateway: GatewayConfig::default(),
            inference: InferenceConfig::default(),
            stream: StreamConfig::default(),
            dootask: DooTaskConfig::default(),
            default_tool: DefaultToolConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.compression_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "stream.compression_interval_ms must be greater than 0".into(),
            ));
        }
        if self.inference.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "inference.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.stream.deadline_secs == 0 || self.stream.idle_notice_secs == 0 {
            return Err(ConfigError::Validation(
                "stream relay timeouts must be greater than 0".into(),
            ));
        }
        if self.stream.session_ttl_secs == 0
            || self.stream.claim_ttl_secs == 0
            || self.stream.log_ttl_secs == 0
        {
            return Err(ConfigError::Validation(
                "stream TTLs must be greater than 0".into(),
            ));
        }
        if self.default_tool.enabled && self.default_tool.check_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "default_tool.check_interval_secs must be greater than 0".into(),
            ));
        }
        url::Url::parse(&self.inference.endpoint()).map_err(|e| {
            ConfigError::Validation(format!("inference endpoint is not a valid URL: {e}"))
        })?;
        url::Url::parse(&self.dootask.base_url).map_err(|e| {
            ConfigError::Validation(format!("dootask.base_url is not a valid URL: {e}"))
        })?;
        Ok(())
    }

    /// sqlx connection URL, defaulting to a file in the data directory.
    pub fn database_url(&self) -> String {
        if self.database.url.trim().is_empty() {
            format!(
                "sqlite://{}?mode=rwc",
                self.data_dir.join(DATABASE_FILE).display()
            )
        } else {
            self.database.url.clone()
        }
    }

    /// Copy safe to print: the bot token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(token) = copy.dootask.bot_token.as_mut() {
            *token = "***".into();
        }
        copy
    }
}
