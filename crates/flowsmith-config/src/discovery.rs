use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::credentials::EnvLookup;
use super::{Config, ConfigSource, ProviderSettings};

/// Directory holding the project configuration
pub const CONFIG_DIR: &str = ".flowsmith";

/// Configuration file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Values supplied on the command line; they override every other source.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub store_root: Option<PathBuf>,
    pub artifacts_root: Option<PathBuf>,
    pub provider: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    llm: Option<TomlLlm>,
    artifacts: Option<TomlArtifacts>,
    store: Option<TomlStore>,
    deploy: Option<TomlDeploy>,
    improvement: Option<TomlImprovement>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlLlm {
    default_provider: Option<String>,
    request_timeout_secs: Option<u64>,
    openai: Option<TomlProvider>,
    anthropic: Option<TomlProvider>,
    gemini: Option<TomlProvider>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlProvider {
    api_key_env: Option<String>,
    base_url: Option<String>,
    default_model: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlArtifacts {
    root: Option<String>,
    extension: Option<String>,
    generations_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlStore {
    root: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlDeploy {
    shared_dirs: Option<Vec<String>>,
    connection_name: Option<String>,
    connect_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    ssh_program: Option<String>,
    scp_program: Option<String>,
    sshpass_program: Option<String>,
    connection: Option<TomlConnection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConnection {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password_env: Option<String>,
    private_key_path: Option<String>,
    remote_base_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlImprovement {
    temperature: Option<f32>,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
}

/// Records `key` as coming from `source` and assigns the value.
macro_rules! apply {
    ($attr:expr, $source:expr, $key:literal, $target:expr, $value:expr) => {
        if let Some(v) = $value {
            $target = v;
            $attr.insert($key.to_string(), $source.clone());
        }
    };
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for discovery and the process
    /// environment for `FLOWSMITH_*` overrides.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        let env = |key: &str| std::env::var(key).ok();
        Self::discover_from(&start_dir, cli_args, &env)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs, env: &EnvLookup) -> Result<Self> {
        let start = utf8(start_dir)?;

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(anyhow!(flowsmith_utils::ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }));
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        // Relative paths in a discovered file are anchored at the project root
        // (the directory that holds `.flowsmith/`).
        let base_dir = match &config_path {
            Some(path) => project_root_for(path, &start),
            None => start.clone(),
        };

        let mut config = Config::defaults_at(&base_dir);
        let mut attr: HashMap<String, ConfigSource> = HashMap::new();

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let source = ConfigSource::ConfigFile(path.clone());
            config.apply_file(file_config, &base_dir, &source, &mut attr);
        }

        config.apply_env(env, &start, &mut attr);
        config.apply_cli(cli_args, &start, &mut attr)?;
        config.source_attribution = attr;

        config.validate()?;
        Ok(config)
    }

    fn apply_file(
        &mut self,
        file: TomlConfig,
        base: &Utf8Path,
        source: &ConfigSource,
        attr: &mut HashMap<String, ConfigSource>,
    ) {
        if let Some(llm) = file.llm {
            apply!(attr, source, "llm.default_provider", self.llm.default_provider, llm.default_provider);
            apply!(attr, source, "llm.request_timeout_secs", self.llm.request_timeout_secs, llm.request_timeout_secs);
            merge_provider(&mut self.llm.openai, llm.openai);
            merge_provider(&mut self.llm.anthropic, llm.anthropic);
            merge_provider(&mut self.llm.gemini, llm.gemini);
        }

        if let Some(artifacts) = file.artifacts {
            apply!(attr, source, "artifacts.root", self.artifacts.root, artifacts.root.map(|p| anchor(base, &p)));
            apply!(attr, source, "artifacts.extension", self.artifacts.extension, artifacts.extension);
            apply!(attr, source, "artifacts.generations_dir", self.artifacts.generations_dir, artifacts.generations_dir.map(|p| anchor(base, &p)));
        }

        if let Some(store) = file.store {
            apply!(attr, source, "store.root", self.store.root, store.root.map(|p| anchor(base, &p)));
        }

        if let Some(deploy) = file.deploy {
            let shared = deploy
                .shared_dirs
                .map(|dirs| dirs.iter().map(|d| anchor(base, d)).collect::<Vec<_>>());
            apply!(attr, source, "deploy.shared_dirs", self.deploy.shared_dirs, shared);
            apply!(attr, source, "deploy.connection_name", self.deploy.connection_name, deploy.connection_name);
            apply!(attr, source, "deploy.connect_timeout_secs", self.deploy.connect_timeout_secs, deploy.connect_timeout_secs);
            apply!(attr, source, "deploy.command_timeout_secs", self.deploy.command_timeout_secs, deploy.command_timeout_secs);
            apply!(attr, source, "deploy.ssh_program", self.deploy.ssh_program, deploy.ssh_program);
            apply!(attr, source, "deploy.scp_program", self.deploy.scp_program, deploy.scp_program);
            apply!(attr, source, "deploy.sshpass_program", self.deploy.sshpass_program, deploy.sshpass_program);

            if let Some(conn) = deploy.connection {
                let target = &mut self.deploy.connection;
                apply!(attr, source, "deploy.connection.host", target.host, conn.host);
                apply!(attr, source, "deploy.connection.port", target.port, conn.port);
                apply!(attr, source, "deploy.connection.username", target.username, conn.username);
                apply!(attr, source, "deploy.connection.password_env", target.password_env, conn.password_env.map(Some));
                apply!(attr, source, "deploy.connection.private_key_path", target.private_key_path, conn.private_key_path.map(|p| Some(anchor(base, &p))));
                apply!(attr, source, "deploy.connection.remote_base_path", target.remote_base_path, conn.remote_base_path);
            }
        }

        if let Some(improvement) = file.improvement {
            apply!(attr, source, "improvement.temperature", self.improvement.temperature, improvement.temperature);
            apply!(attr, source, "improvement.system_prompt", self.improvement.system_prompt, improvement.system_prompt);
            apply!(attr, source, "improvement.max_tokens", self.improvement.max_tokens, improvement.max_tokens.map(Some));
        }
    }

    fn apply_env(&mut self, env: &EnvLookup, start: &Utf8Path, attr: &mut HashMap<String, ConfigSource>) {
        let source = ConfigSource::Env;
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        apply!(attr, source, "llm.default_provider", self.llm.default_provider, non_empty("FLOWSMITH_PROVIDER"));
        apply!(attr, source, "store.root", self.store.root, non_empty("FLOWSMITH_STORE").map(|p| anchor(start, &p)));
        apply!(attr, source, "artifacts.root", self.artifacts.root, non_empty("FLOWSMITH_ARTIFACTS_ROOT").map(|p| anchor(start, &p)));
        let shared = non_empty("FLOWSMITH_SHARED_DIRS").map(|raw| {
            std::env::split_paths(&raw)
                .filter_map(|p| Utf8PathBuf::from_path_buf(p).ok())
                .map(|p| anchor(start, p.as_str()))
                .collect::<Vec<_>>()
        });
        apply!(attr, source, "deploy.shared_dirs", self.deploy.shared_dirs, shared);
        apply!(attr, source, "deploy.connection.host", self.deploy.connection.host, non_empty("FLOWSMITH_SSH_HOST"));
        let port = non_empty("FLOWSMITH_SSH_PORT").and_then(|p| p.parse::<u16>().ok());
        apply!(attr, source, "deploy.connection.port", self.deploy.connection.port, port);
    }

    fn apply_cli(
        &mut self,
        cli: &CliArgs,
        start: &Utf8Path,
        attr: &mut HashMap<String, ConfigSource>,
    ) -> Result<()> {
        let source = ConfigSource::Cli;

        let store = cli.store_root.as_deref().map(utf8).transpose()?;
        apply!(attr, source, "store.root", self.store.root, store.map(|p| anchor(start, p.as_str())));

        let artifacts = cli.artifacts_root.as_deref().map(utf8).transpose()?;
        apply!(attr, source, "artifacts.root", self.artifacts.root, artifacts.map(|p| anchor(start, p.as_str())));

        apply!(attr, source, "llm.default_provider", self.llm.default_provider, cli.provider.clone());
        Ok(())
    }

    /// Discover config file by searching upward from a specific directory
    ///
    /// Stops at the filesystem root or at a repository root marker.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists() || current_dir.join(".hg").exists() {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: TomlConfig = toml::from_str(&content).map_err(|e| {
                    anyhow!(flowsmith_utils::ConfigError::InvalidFile(e.to_string()))
                })?;
                Ok(config)
            }
            // A file that vanished between discovery and read behaves like no file
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }
}

fn merge_provider(target: &mut ProviderSettings, file: Option<TomlProvider>) {
    let Some(file) = file else { return };
    if let Some(env) = file.api_key_env {
        target.api_key_env = env;
    }
    if file.base_url.is_some() {
        target.base_url = file.base_url;
    }
    if file.default_model.is_some() {
        target.default_model = file.default_model;
    }
}

fn utf8(path: &Path) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|p| anyhow!("Path is not valid UTF-8: {}", p.display()))
}

fn anchor(base: &Utf8Path, raw: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// `<root>/.flowsmith/config.toml` -> `<root>`; explicit files elsewhere anchor at their own directory.
fn project_root_for(config_path: &Path, fallback: &Utf8Path) -> Utf8PathBuf {
    let Ok(path) = utf8(config_path) else {
        return fallback.to_path_buf();
    };
    let Some(dir) = path.parent() else {
        return fallback.to_path_buf();
    };
    if dir.file_name() == Some(CONFIG_DIR) {
        dir.parent().map_or_else(|| fallback.to_path_buf(), Utf8Path::to_path_buf)
    } else if dir.as_str().is_empty() {
        fallback.to_path_buf()
    } else {
        dir.to_path_buf()
    }
}
