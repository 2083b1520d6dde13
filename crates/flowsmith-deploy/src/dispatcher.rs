use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use flowsmith_config::{Config, Credentials, DeployConfig};
use flowsmith_store::{ConnectionDescriptor, DeploymentRecord, RecordStore};

use crate::error::DeployError;
use crate::shell::{CommandResult, RemoteShell};
use crate::strategy::{DeployStrategy, DeployTarget, RemoteShellStrategy, SharedStorageStrategy};

const CONNECTION_TEST_MESSAGE: &str = "Connection test successful";

/// Result of `connection test`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTestReport {
    pub connection: String,
    pub destination: String,
    pub success: bool,
    pub message: String,
}

/// Tries each strategy in order and owns the deployment history
pub struct DeploymentDispatcher {
    store: RecordStore,
    strategies: Vec<Box<dyn DeployStrategy>>,
    shell: Arc<dyn RemoteShell>,
    template: ConnectionDescriptor,
}

impl DeploymentDispatcher {
    #[must_use]
    pub fn new(
        store: RecordStore,
        strategies: Vec<Box<dyn DeployStrategy>>,
        shell: Arc<dyn RemoteShell>,
        template: ConnectionDescriptor,
    ) -> Self {
        Self {
            store,
            strategies,
            shell,
            template,
        }
    }

    /// Shared storage first, then the remote shell
    #[must_use]
    pub fn from_config(
        config: &Config,
        credentials: &Credentials,
        store: RecordStore,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        let template = connection_template(&config.deploy, credentials);
        let strategies: Vec<Box<dyn DeployStrategy>> = vec![
            Box::new(SharedStorageStrategy::new(
                store.clone(),
                config.deploy.shared_dirs.clone(),
                &template.name,
            )),
            Box::new(RemoteShellStrategy::new(
                store.clone(),
                shell.clone(),
                template.clone(),
            )),
        ];
        Self::new(store, strategies, shell, template)
    }

    /// Deliver `content` as `file_name` under `workflow_id`
    pub async fn deploy(
        &self,
        content: &str,
        file_name: &str,
        workflow_id: Option<&str>,
    ) -> Result<DeploymentRecord, DeployError> {
        let target = DeployTarget::new(file_name, workflow_id.map(str::to_string))?;
        self.deploy_target(content, &target).await
    }

    /// First successful strategy wins; otherwise the last failure is returned
    pub async fn deploy_target(
        &self,
        content: &str,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, DeployError> {
        let mut last_error = None;
        for strategy in &self.strategies {
            match strategy.attempt(content, target).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    debug!(strategy = %strategy.kind(), error = %e, "Deployment strategy failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(DeployError::NoStrategy))
    }

    /// Redeliver the content of a failed or pending deployment as a new record
    pub async fn retry_deployment(&self, id: &str) -> Result<DeploymentRecord, DeployError> {
        let original = self.show(id)?;
        if !original.status.is_retryable() {
            return Err(DeployError::NotRetryable {
                id: original.id.to_string(),
                status: original.status.to_string(),
            });
        }
        info!(deployment = %original.id, "Retrying deployment");
        let target = DeployTarget::new(&original.file_name, original.workflow_id.clone())?
            .with_notes(format!("Retry of deployment {}", original.id));
        self.deploy_target(&original.content, &target).await
    }

    pub fn show(&self, id: &str) -> Result<DeploymentRecord, DeployError> {
        let id = Uuid::parse_str(id.trim()).map_err(|_| DeployError::InvalidId(id.to_string()))?;
        Ok(self.store.load(&id.to_string())?)
    }

    /// All deployments, newest first
    pub fn list(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        let mut records: Vec<DeploymentRecord> = self.store.list()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Create the configured connection unless it exists; `true` when created
    pub fn setup_default_connection(&self) -> Result<(ConnectionDescriptor, bool), DeployError> {
        let (connection, created) = self.store.get_or_create_connection(self.template.clone())?;
        if created {
            info!(connection = %connection.name, destination = %connection.destination(), "Created connection");
        }
        Ok((connection, created))
    }

    /// Connect, run `echo`, and always disconnect
    pub async fn test_connection(
        &self,
        name: Option<&str>,
    ) -> Result<ConnectionTestReport, DeployError> {
        let connection = self.connection(name)?;
        let mut report = ConnectionTestReport {
            connection: connection.name.clone(),
            destination: connection.destination(),
            success: false,
            message: String::new(),
        };

        let mut session = match self.shell.connect(&connection).await {
            Ok(session) => session,
            Err(e) => {
                warn!(connection = %connection.name, error = %e, "Connection test failed");
                report.message = e.to_string();
                return Ok(report);
            }
        };
        let outcome = session
            .execute_command(&format!("echo '{CONNECTION_TEST_MESSAGE}'"))
            .await;
        session.close().await;

        match outcome {
            Ok(result) if result.success && result.stdout.trim() == CONNECTION_TEST_MESSAGE => {
                report.success = true;
                report.message = CONNECTION_TEST_MESSAGE.to_string();
            }
            Ok(result) => {
                report.message = format!(
                    "Unexpected reply (exit {:?}): {}",
                    result.exit_status,
                    result.stderr.trim()
                );
            }
            Err(e) => report.message = e.to_string(),
        }
        Ok(report)
    }

    /// Run one command on a connection, disconnecting afterwards
    pub async fn execute_command(
        &self,
        name: Option<&str>,
        command: &str,
    ) -> Result<CommandResult, DeployError> {
        let connection = self.connection(name)?;
        let mut session = self
            .shell
            .connect(&connection)
            .await
            .map_err(|e| DeployError::connection(&connection.name, e))?;
        let outcome = session.execute_command(command).await;
        session.close().await;
        outcome.map_err(DeployError::remote)
    }

    /// The managed connection gets the configured password; others must
    /// authenticate with their private key.
    fn connection(&self, name: Option<&str>) -> Result<ConnectionDescriptor, DeployError> {
        let name = name.unwrap_or(&self.template.name);
        if name == self.template.name {
            let (mut connection, _) = self.store.get_or_create_connection(self.template.clone())?;
            connection.password.clone_from(&self.template.password);
            Ok(connection)
        } else {
            Ok(self.store.load(name)?)
        }
    }
}

/// Connection descriptor seeded from `[deploy]` with the password filled in
#[must_use]
pub fn connection_template(deploy: &DeployConfig, credentials: &Credentials) -> ConnectionDescriptor {
    let settings = &deploy.connection;
    let mut connection = ConnectionDescriptor::new(
        &deploy.connection_name,
        &settings.host,
        &settings.username,
        &settings.remote_base_path,
    );
    connection.port = settings.port;
    connection.private_key_path = settings.private_key_path.as_ref().map(ToString::to_string);
    connection.password = credentials.ssh_password().map(str::to_string);
    connection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRemoteShell;
    use camino::Utf8PathBuf;
    use flowsmith_store::{DeployStrategyKind, DeploymentStatus};
    use flowsmith_utils::UserFriendlyError;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        base: Utf8PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let config = Config::minimal_for_testing(&base);
        Fixture {
            _dir: dir,
            base,
            config,
        }
    }

    fn dispatcher(f: &Fixture, shell: &MockRemoteShell) -> DeploymentDispatcher {
        let credentials = Credentials::default().with_ssh_password("pw");
        DeploymentDispatcher::from_config(
            &f.config,
            &credentials,
            RecordStore::new(f.config.store.root.clone()),
            Arc::new(shell.clone()),
        )
    }

    #[tokio::test]
    async fn test_falls_back_to_remote_shell() {
        let f = fixture();
        let shell = MockRemoteShell::new();
        let record = dispatcher(&f, &shell)
            .deploy("x=2\n", "model.py", Some("42"))
            .await
            .unwrap();

        assert_eq!(record.strategy, DeployStrategyKind::RemoteShell);
        assert_eq!(record.remote_path.as_deref(), Some("/app/workflows/42/model.py"));
        assert_eq!(shell.uploaded("/app/workflows/42/model.py").as_deref(), Some("x=2\n"));
        assert_eq!(shell.directories(), vec!["/app/workflows/42".to_string()]);
    }

    #[tokio::test]
    async fn test_shared_storage_preferred_when_mounted() {
        let mut f = fixture();
        let shared = f.base.join("mnt");
        std::fs::create_dir_all(&shared).unwrap();
        f.config.deploy.shared_dirs = vec![shared.clone()];
        let shell = MockRemoteShell::new();

        let record = dispatcher(&f, &shell)
            .deploy("x=2\n", "model.py", None)
            .await
            .unwrap();
        assert_eq!(record.strategy, DeployStrategyKind::SharedStorage);
        assert!(shared.join("generated_files/model.py").is_file());
        assert_eq!(shell.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_creates_new_record() {
        let f = fixture();
        let refusing = MockRemoteShell::new().refuse_connections();
        let err = dispatcher(&f, &refusing)
            .deploy("x", "model.py", Some("42"))
            .await
            .unwrap_err();
        let failed_id = err.record().unwrap().id;

        let shell = MockRemoteShell::new();
        let deployments = dispatcher(&f, &shell);
        let retried = deployments
            .retry_deployment(&failed_id.to_string())
            .await
            .unwrap();
        assert_ne!(retried.id, failed_id);
        assert_eq!(retried.status, DeploymentStatus::Completed);
        assert_eq!(
            retried.notes,
            Some(format!("Retry of deployment {failed_id}"))
        );

        let original = deployments.show(&failed_id.to_string()).unwrap();
        assert_eq!(original.status, DeploymentStatus::Failed);
        assert_eq!(deployments.list().unwrap().len(), 2);

        let err = deployments
            .retry_deployment(&retried.id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::NotRetryable { .. }));
    }

    #[tokio::test]
    async fn test_retry_of_pending_leaves_original_untouched() {
        let f = fixture();
        let store = RecordStore::new(f.config.store.root.clone());
        let pending = DeploymentRecord::new(
            "ml_runner",
            "model.py",
            "y=1",
            Some("42".to_string()),
            DeployStrategyKind::RemoteShell,
        );
        store.save(&pending).unwrap();

        let shell = MockRemoteShell::new();
        let deployments = dispatcher(&f, &shell);
        let before = deployments.show(&pending.id.to_string()).unwrap();
        let retried = deployments
            .retry_deployment(&pending.id.to_string())
            .await
            .unwrap();

        assert_ne!(retried.id, pending.id);
        assert_eq!(retried.status, DeploymentStatus::Completed);
        assert_eq!(retried.content, "y=1");
        assert_eq!(shell.uploaded("/app/workflows/42/model.py").as_deref(), Some("y=1"));
        let after = deployments.show(&pending.id.to_string()).unwrap();
        assert_eq!(after, before);
        assert_eq!(after.status, DeploymentStatus::Pending);
        assert_eq!(deployments.list().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_names_that_leave_the_base_are_rejected() {
        let mut f = fixture();
        let shared = f.base.join("mnt").join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        f.config.deploy.shared_dirs = vec![shared.clone()];
        let shell = MockRemoteShell::new();
        let deployments = dispatcher(&f, &shell);

        for (file_name, workflow_id) in [
            ("model.py", Some("../../escaped")),
            ("model.py", Some("..")),
            ("../model.py", None),
            ("a\\b.py", Some("42")),
        ] {
            let err = deployments
                .deploy("x=1", file_name, workflow_id)
                .await
                .unwrap_err();
            assert!(matches!(err, DeployError::InvalidTarget { .. }), "{err:?}");
            assert_eq!(err.kind(), flowsmith_utils::ErrorKind::InvalidArguments);
        }

        assert!(!f.base.join("escaped").exists());
        assert!(!f.base.join("mnt").join("model.py").exists());
        assert!(deployments.list().unwrap().is_empty());
        assert_eq!(shell.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_show_rejects_bad_ids() {
        let f = fixture();
        let deployments = dispatcher(&f, &MockRemoteShell::new());
        assert!(matches!(deployments.show("nope"), Err(DeployError::InvalidId(_))));
        assert!(matches!(
            deployments.show(&Uuid::new_v4().to_string()),
            Err(DeployError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_test_reports_and_closes() {
        let f = fixture();
        let shell = MockRemoteShell::new();
        let report = dispatcher(&f, &shell).test_connection(None).await.unwrap();
        assert!(report.success, "{report:?}");
        assert_eq!(report.destination, "root@ml_runner");
        assert_eq!(shell.close_count(), 1);

        let refusing = MockRemoteShell::new().refuse_connections();
        let report = dispatcher(&f, &refusing).test_connection(None).await.unwrap();
        assert!(!report.success);
        assert!(report.message.contains("Connection refused"));
    }

    #[tokio::test]
    async fn test_setup_default_connection_is_idempotent() {
        let f = fixture();
        let deployments = dispatcher(&f, &MockRemoteShell::new());
        let (first, created) = deployments.setup_default_connection().unwrap();
        assert!(created);
        assert_eq!(first.remote_base_path, "/app/workflows");
        let (_, created) = deployments.setup_default_connection().unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_execute_command_passes_result_through() {
        let f = fixture();
        let shell =
            MockRemoteShell::new().with_command_reply(CommandResult::new(Some(3), "", "bad"));
        let result = dispatcher(&f, &shell)
            .execute_command(None, "ls /nowhere")
            .await
            .unwrap();
        assert_eq!(result.exit_status, Some(3));
        assert!(!result.success);
        assert_eq!(shell.commands(), vec!["ls /nowhere".to_string()]);
        assert_eq!(shell.close_count(), 1);
    }
}
