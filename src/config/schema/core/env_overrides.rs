use super::Config;

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    /// Environment wins over the file. Unparseable numbers are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty("AI_BASE_URL") {
            self.inference.base_url = Some(url);
        }

        if let Some(port) = non_empty("PYTHON_AI_SERVICE_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            self.inference.service_port = port;
        }

        if let Some(secs) = non_empty("AI_REQUEST_TIMEOUT")
            && let Ok(secs) = secs.parse::<u64>()
        {
            self.inference.request_timeout_secs = secs;
        }

        if let Some(ms) = non_empty("AI_STREAM_INTERVAL")
            && let Ok(ms) = ms.parse::<u64>()
        {
            self.stream.compression_interval_ms = ms;
        }

        if let Some(token) = non_empty("DOOTASK_BOT_TOKEN") {
            self.dootask.bot_token = Some(token);
        }

        if let Some(url) = non_empty("DOOTASK_BASE_URL") {
            self.dootask.base_url = url;
        }

        if let Some(host) = non_empty("DOOTASK_AI_HOST").or_else(|| non_empty("HOST")) {
            self.gateway.host = host;
        }

        if let Some(port) = non_empty("DOOTASK_AI_PORT").or_else(|| non_empty("PORT"))
            && let Ok(port) = port.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Some(url) = non_empty("DOOTASK_AI_PUBLIC_URL") {
            self.gateway.public_base_url = url;
        }

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::core::test_env::EnvScope;

    #[test]
    fn inference_and_stream_variables_override() {
        let env = EnvScope::clean();
        env.set("AI_BASE_URL", "http://ai.internal:9000");
        env.set("AI_REQUEST_TIMEOUT", "15");
        env.set("AI_STREAM_INTERVAL", "250");
        env.set("DOOTASK_BOT_TOKEN", "bot-token");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.inference.endpoint(), "http://ai.internal:9000");
        assert_eq!(config.inference.request_timeout_secs, 15);
        assert_eq!(config.stream.compression_interval_ms, 250);
        assert_eq!(config.dootask.bot_token.as_deref(), Some("bot-token"));
    }

    #[test]
    fn service_port_is_used_without_base_url() {
        let env = EnvScope::clean();
        env.set("PYTHON_AI_SERVICE_PORT", "8100");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.inference.endpoint(), "http://localhost:8100");
    }

    #[test]
    fn prefixed_gateway_variables_beat_generic_ones() {
        let env = EnvScope::clean();
        env.set("HOST", "10.0.0.1");
        env.set("PORT", "6000");
        env.set("DOOTASK_AI_PORT", "6100");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.gateway.host, "10.0.0.1");
        assert_eq!(config.gateway.port, 6100);
    }

    #[test]
    fn invalid_numbers_and_blank_values_are_ignored() {
        let env = EnvScope::clean();
        env.set("AI_STREAM_INTERVAL", "fast");
        env.set("PORT", "99999");
        env.set("DOOTASK_BASE_URL", "   ");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.stream.compression_interval_ms, 100);
        assert_eq!(config.gateway.port, 5001);
        assert_eq!(config.dootask.base_url, "http://nginx");
    }
}
