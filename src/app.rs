use anyhow::{Context, Result};
use std::sync::Arc;

use flowsmith_artifacts::ArtifactResolver;
use flowsmith_config::{Config, Credentials};
use flowsmith_deploy::{DeploymentDispatcher, RemoteShell, SshCli};
use flowsmith_engine::{CodeImprovementRound, PathLocks, RequestLifecycle};
use flowsmith_llm::{HttpClient, ProviderRegistry, Transport};
use flowsmith_store::RecordStore;

/// Everything a command needs, built once from the effective configuration
pub struct App {
    config: Config,
    store: RecordStore,
    registry: Arc<ProviderRegistry>,
    resolver: ArtifactResolver,
    deployer: Arc<DeploymentDispatcher>,
    locks: PathLocks,
}

impl App {
    /// Real vendor endpoints and the system ssh/scp binaries
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpClient::new().context("Failed to build the HTTP client")?);
        let shell: Arc<dyn RemoteShell> = Arc::new(SshCli::from_config(&config.deploy));
        Self::with_parts(config, credentials, transport, shell)
    }

    /// Explicit transport and remote shell, for embedding and tests
    pub fn with_parts(
        config: Config,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        shell: Arc<dyn RemoteShell>,
    ) -> Result<Self> {
        let store = RecordStore::new(config.store.root.clone());
        let registry = ProviderRegistry::new(&config.llm, credentials.clone(), transport)
            .context("Invalid LLM provider configuration")?;
        let resolver = ArtifactResolver::from_config(&config.artifacts);
        let deployer =
            DeploymentDispatcher::from_config(&config, &credentials, store.clone(), shell);
        Ok(Self {
            config,
            store,
            registry: Arc::new(registry),
            resolver,
            deployer: Arc::new(deployer),
            locks: PathLocks::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    #[must_use]
    pub fn deployer(&self) -> &DeploymentDispatcher {
        &self.deployer
    }

    #[must_use]
    pub fn lifecycle(&self) -> RequestLifecycle {
        RequestLifecycle::new(self.store.clone(), self.registry.clone())
    }

    /// A round that deploys successful rewrites unless `deploy` is false
    #[must_use]
    pub fn improvement(&self, deploy: bool) -> CodeImprovementRound {
        let round = CodeImprovementRound::new(
            self.store.clone(),
            self.registry.clone(),
            self.resolver.clone(),
            self.config.improvement.clone(),
        )
        .with_locks(self.locks.clone());
        if deploy {
            round.with_deployer(self.deployer.clone())
        } else {
            round
        }
    }
}
