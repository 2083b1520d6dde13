use std::collections::HashMap;
use std::fmt;

use super::Config;

/// Environment-style key/value lookup.
///
/// The process environment in production; a closure over a fixed map in tests.
pub type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Secrets resolved once from an [`EnvLookup`] using the names in [`Config`].
///
/// Values are stored verbatim (placeholders included); deciding whether a
/// value counts as "set" belongs to the consumer that knows its placeholder.
#[derive(Clone, Default)]
pub struct Credentials {
    provider_keys: HashMap<String, String>,
    ssh_password: Option<String>,
}

impl Credentials {
    /// Resolve credentials from the process environment
    #[must_use]
    pub fn from_env(config: &Config) -> Self {
        Self::from_lookup(config, &|key: &str| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary lookup
    #[must_use]
    pub fn from_lookup(config: &Config, lookup: &EnvLookup) -> Self {
        let mut provider_keys = HashMap::new();
        for (name, settings) in [
            ("openai", &config.llm.openai),
            ("anthropic", &config.llm.anthropic),
            ("gemini", &config.llm.gemini),
        ] {
            if let Some(value) = lookup(&settings.api_key_env) {
                provider_keys.insert(name.to_string(), value);
            }
        }

        let ssh_password = config
            .deploy
            .connection
            .password_env
            .as_deref()
            .and_then(lookup)
            .filter(|p| !p.is_empty());

        Self {
            provider_keys,
            ssh_password,
        }
    }

    /// Build credentials directly (tests and embedding)
    #[must_use]
    pub fn with_provider_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.provider_keys.insert(provider.to_string(), key.into());
        self
    }

    /// Set the remote connection password directly (tests and embedding)
    #[must_use]
    pub fn with_ssh_password(mut self, password: impl Into<String>) -> Self {
        self.ssh_password = Some(password.into());
        self
    }

    /// Raw API key for a provider, if any value was found
    #[must_use]
    pub fn provider_key(&self, provider: &str) -> Option<&str> {
        self.provider_keys.get(provider).map(String::as_str)
    }

    /// Password for the managed remote connection
    #[must_use]
    pub fn ssh_password(&self) -> Option<&str> {
        self.ssh_password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&str> = self.provider_keys.keys().map(String::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("Credentials")
            .field("providers", &providers)
            .field("ssh_password", &self.ssh_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn test_from_lookup_uses_configured_env_names() {
        let mut config = Config::minimal_for_testing(Utf8Path::new("/tmp/fs"));
        config.llm.gemini.api_key_env = "MY_GEMINI".to_string();
        let lookup = |key: &str| match key {
            "OPENAI_API_KEY" => Some("sk-live".to_string()),
            "MY_GEMINI" => Some("g-key".to_string()),
            "FLOWSMITH_SSH_PASSWORD" => Some("pw".to_string()),
            _ => None,
        };

        let creds = Credentials::from_lookup(&config, &lookup);

        assert_eq!(creds.provider_key("openai"), Some("sk-live"));
        assert_eq!(creds.provider_key("gemini"), Some("g-key"));
        assert_eq!(creds.provider_key("anthropic"), None);
        assert_eq!(creds.ssh_password(), Some("pw"));
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let creds = Credentials::default().with_provider_key("openai", "sk-secret-value");
        let debug = format!("{creds:?}");
        assert!(debug.contains("openai"));
        assert!(!debug.contains("sk-secret-value"));
    }
}
