use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default per-request timeout for vendor calls in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default connect timeout for the remote shell in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a single remote command (mkdir, upload, verify) in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Default temperature for code rewriting rounds
pub const DEFAULT_IMPROVEMENT_TEMPERATURE: f32 = 0.3;

/// Default name of the managed remote connection
pub const DEFAULT_CONNECTION_NAME: &str = "ml_runner";

/// Default base path on the execution host
pub const DEFAULT_REMOTE_BASE_PATH: &str = "/app/workflows";

/// Default system prompt for code rewriting rounds
pub const DEFAULT_IMPROVEMENT_SYSTEM_PROMPT: &str = "You are an expert Python developer specialised in Metaflow. \
Analyse the provided code in order to complete and improve it.\n\
IMPORTANT: reply ONLY with the improved Python code, without comments, explanations or additional text.\n\
Your output must be valid Python code that can be saved directly to a .py file.";

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Command-line flag
    Cli,
    /// `FLOWSMITH_*` environment variable
    Env,
    /// Discovered or explicit config file
    ConfigFile(PathBuf),
    /// Set through [`crate::ConfigBuilder`]
    Programmatic,
    /// Built-in default
    Defaults,
}

/// Fully resolved flowsmith configuration.
///
/// Built once by [`Config::discover`] (or the builder) and passed explicitly to
/// every component; nothing below the CLI reads settings from the process
/// environment on its own.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub artifacts: ArtifactsConfig,
    pub store: StoreConfig,
    pub deploy: DeployConfig,
    pub improvement: ImprovementConfig,
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[llm]` section
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider used when a command does not name one
    pub default_provider: String,
    /// Per-request timeout applied by every adapter
    pub request_timeout_secs: u64,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub gemini: ProviderSettings,
}

impl LlmConfig {
    /// Settings for a provider by its canonical name
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        match name {
            "openai" => Some(&self.openai),
            "anthropic" => Some(&self.anthropic),
            "gemini" => Some(&self.gemini),
            _ => None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            openai: ProviderSettings::with_key_env("OPENAI_API_KEY"),
            anthropic: ProviderSettings::with_key_env("ANTHROPIC_API_KEY"),
            gemini: ProviderSettings::with_key_env("GEMINI_API_KEY"),
        }
    }
}

/// `[llm.<provider>]` sections
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Override for the vendor endpoint (tests, proxies)
    pub base_url: Option<String>,
    /// Model used when a request does not name one
    pub default_model: Option<String>,
}

impl ProviderSettings {
    fn with_key_env(env: &str) -> Self {
        Self {
            api_key_env: env.to_string(),
            base_url: None,
            default_model: None,
        }
    }
}

/// `[artifacts]` section
#[derive(Debug, Clone)]
pub struct ArtifactsConfig {
    /// Root holding one directory per workflow id
    pub root: Utf8PathBuf,
    /// Extension of generated source files, without the dot
    pub extension: String,
    /// Directory of upstream generation status records (`<id>.json`)
    pub generations_dir: Utf8PathBuf,
}

/// `[store]` section
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: Utf8PathBuf,
}

/// `[deploy]` section
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Candidate shared directories, tried in order; the first that exists wins
    pub shared_dirs: Vec<Utf8PathBuf>,
    /// Name of the managed remote connection
    pub connection_name: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub ssh_program: String,
    pub scp_program: String,
    pub sshpass_program: String,
    /// Descriptor used when the named connection is created for the first time
    pub connection: ConnectionConfig,
}

/// `[deploy.connection]` section
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Environment variable holding the password, if password auth is used
    pub password_env: Option<String>,
    pub private_key_path: Option<Utf8PathBuf>,
    pub remote_base_path: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CONNECTION_NAME.to_string(),
            port: 22,
            username: "root".to_string(),
            password_env: Some("FLOWSMITH_SSH_PASSWORD".to_string()),
            private_key_path: None,
            remote_base_path: DEFAULT_REMOTE_BASE_PATH.to_string(),
        }
    }
}

/// `[improvement]` section
#[derive(Debug, Clone)]
pub struct ImprovementConfig {
    pub temperature: f32,
    pub system_prompt: String,
    pub max_tokens: Option<u32>,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_IMPROVEMENT_TEMPERATURE,
            system_prompt: DEFAULT_IMPROVEMENT_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
        }
    }
}

impl Config {
    /// Defaults with every path rooted at `base`.
    #[must_use]
    pub fn defaults_at(base: &camino::Utf8Path) -> Self {
        Self {
            llm: LlmConfig::default(),
            artifacts: ArtifactsConfig {
                root: base.join("generated_workflows"),
                extension: "py".to_string(),
                generations_dir: base.join(".flowsmith").join("generations"),
            },
            store: StoreConfig {
                root: base.join(".flowsmith").join("store"),
            },
            deploy: DeployConfig {
                shared_dirs: vec![
                    base.join("workflows"),
                    Utf8PathBuf::from(DEFAULT_REMOTE_BASE_PATH),
                ],
                connection_name: DEFAULT_CONNECTION_NAME.to_string(),
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
                command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
                ssh_program: "ssh".to_string(),
                scp_program: "scp".to_string(),
                sshpass_program: "sshpass".to_string(),
                connection: ConnectionConfig::default(),
            },
            improvement: ImprovementConfig::default(),
            source_attribution: HashMap::new(),
        }
    }

    /// Minimal configuration rooted at `base` with no shared directories.
    ///
    /// Deployment always falls through to the remote shell unless a test adds
    /// a shared directory explicitly.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing(base: &camino::Utf8Path) -> Self {
        let mut config = Self::defaults_at(base);
        config.deploy.shared_dirs.clear();
        config
    }
}
