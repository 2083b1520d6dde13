use flowsmith_utils::ConfigError;

use super::Config;

/// Provider names accepted in `llm.default_provider`
const KNOWN_PROVIDERS: [&str; 3] = ["openai", "anthropic", "gemini"];

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.llm.default_provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(invalid(
                "llm.default_provider",
                format!("unknown provider '{provider}'"),
            ));
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(invalid("llm.request_timeout_secs", "must be greater than 0"));
        }

        for name in KNOWN_PROVIDERS {
            let Some(settings) = self.llm.provider(name) else {
                continue;
            };
            if settings.api_key_env.trim().is_empty() {
                return Err(invalid(
                    &format!("llm.{name}.api_key_env"),
                    "must name an environment variable",
                ));
            }
            if let Some(url) = &settings.base_url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                return Err(invalid(
                    &format!("llm.{name}.base_url"),
                    format!("'{url}' is not an http(s) URL"),
                ));
            }
        }

        let extension = self.artifacts.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains('/') {
            return Err(invalid("artifacts.extension", "must be a bare file extension"));
        }

        if self.deploy.connection_name.trim().is_empty() {
            return Err(invalid("deploy.connection_name", "must not be empty"));
        }

        if self.deploy.connect_timeout_secs == 0 {
            return Err(invalid("deploy.connect_timeout_secs", "must be greater than 0"));
        }

        if self.deploy.command_timeout_secs == 0 {
            return Err(invalid("deploy.command_timeout_secs", "must be greater than 0"));
        }

        if self.deploy.connection.port == 0 {
            return Err(invalid("deploy.connection.port", "must be between 1 and 65535"));
        }

        if self.deploy.connection.host.trim().is_empty() {
            return Err(invalid("deploy.connection.host", "must not be empty"));
        }

        if !self.deploy.connection.remote_base_path.starts_with('/') {
            return Err(invalid(
                "deploy.connection.remote_base_path",
                "must be an absolute path",
            ));
        }

        let temperature = self.improvement.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid(
                "improvement.temperature",
                format!("{temperature} is outside 0.0..=2.0"),
            ));
        }

        if self.improvement.max_tokens == Some(0) {
            return Err(invalid("improvement.max_tokens", "must be greater than 0"));
        }

        Ok(())
    }
}
