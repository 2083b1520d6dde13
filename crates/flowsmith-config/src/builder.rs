use camino::{Utf8Path, Utf8PathBuf};
use flowsmith_utils::ConfigError;

use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration rooted at `base`.
    ///
    /// Use this when embedding flowsmith without config files or environment
    /// variables.
    ///
    /// # Example
    ///
    /// ```rust
    /// use flowsmith_config::Config;
    ///
    /// let config = Config::builder("/srv/flowsmith")
    ///     .default_provider("anthropic")
    ///     .shared_dirs(["/mnt/workflows"])
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.llm.default_provider, "anthropic");
    /// ```
    #[must_use]
    pub fn builder(base: impl AsRef<Utf8Path>) -> ConfigBuilder {
        ConfigBuilder::new(base)
    }
}

/// Builder for programmatic configuration.
///
/// Every value set here is attributed to [`ConfigSource::Programmatic`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the defaults with every path rooted at `base`.
    #[must_use]
    pub fn new(base: impl AsRef<Utf8Path>) -> Self {
        Self {
            config: Config::defaults_at(base.as_ref()),
        }
    }

    fn mark(&mut self, key: &str) {
        self.config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Programmatic);
    }

    #[must_use]
    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.default_provider = provider.into();
        self.mark("llm.default_provider");
        self
    }

    /// Override a provider's endpoint (mock servers, proxies)
    #[must_use]
    pub fn provider_base_url(mut self, provider: &str, url: impl Into<String>) -> Self {
        let url = url.into();
        match provider {
            "openai" => self.config.llm.openai.base_url = Some(url),
            "anthropic" => self.config.llm.anthropic.base_url = Some(url),
            "gemini" => self.config.llm.gemini.base_url = Some(url),
            _ => return self,
        }
        self.mark(&format!("llm.{provider}.base_url"));
        self
    }

    #[must_use]
    pub fn artifacts_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.config.artifacts.root = root.into();
        self.mark("artifacts.root");
        self
    }

    #[must_use]
    pub fn generations_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.artifacts.generations_dir = dir.into();
        self.mark("artifacts.generations_dir");
        self
    }

    #[must_use]
    pub fn store_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.config.store.root = root.into();
        self.mark("store.root");
        self
    }

    #[must_use]
    pub fn shared_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.config.deploy.shared_dirs = dirs.into_iter().map(Into::into).collect();
        self.mark("deploy.shared_dirs");
        self
    }

    #[must_use]
    pub fn connection_name(mut self, name: impl Into<String>) -> Self {
        self.config.deploy.connection_name = name.into();
        self.mark("deploy.connection_name");
        self
    }

    #[must_use]
    pub fn remote_base_path(mut self, path: impl Into<String>) -> Self {
        self.config.deploy.connection.remote_base_path = path.into();
        self.mark("deploy.connection.remote_base_path");
        self
    }

    #[must_use]
    pub fn improvement_temperature(mut self, temperature: f32) -> Self {
        self.config.improvement.temperature = temperature;
        self.mark("improvement.temperature");
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
