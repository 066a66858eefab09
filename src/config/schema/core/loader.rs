use super::Config;
use super::types::default_data_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load `~/.dootask-ai/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        Self::load_from(&default_data_dir().join("config.toml"))
    }

    /// Load `path` (created with defaults when missing), then apply
    /// environment overrides and validate. Overrides are never written back.
    pub fn load_from(path: &Path) -> Result<Self> {
        let data_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        if !data_dir.as_os_str().is_empty() && !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create config directory {}", data_dir.display())
            })?;
        }

        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            config.config_path = path.to_path_buf();
            config.data_dir = data_dir;
            config
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                data_dir,
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %path.display(), "wrote default config");
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
