use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 5001)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 0.0.0.0)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Base URL handed to the chat platform when a webhook request carries
    /// no usable host headers.
    #[serde(default)]
    pub public_base_url: String,
    /// Extra CORS origins for the webhook and health routes. The stream route
    /// always answers with `Access-Control-Allow-Origin: *`.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    5001
}

fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            public_base_url: String::new(),
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Fallback base URL: the configured public URL, else the bind address.
    pub fn fallback_base_url(&self) -> String {
        if self.public_base_url.trim().is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            self.public_base_url.trim_end_matches('/').to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_config() {
        let config = GatewayConfig::default();

        assert_eq!(config.port, 5001);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.public_base_url.is_empty());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn fallback_base_url_prefers_public_url() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.fallback_base_url(), "http://0.0.0.0:5001");

        config.public_base_url = "https://ai.example.com/".into();
        assert_eq!(config.fallback_base_url(), "https://ai.example.com");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let decoded: GatewayConfig = toml::from_str("port = 7000").unwrap();
        assert_eq!(decoded.port, 7000);
        assert_eq!(decoded.host, "0.0.0.0");
    }
}
