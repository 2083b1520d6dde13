use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

use flowsmith_store::{
    ConnectionDescriptor, DeployStrategyKind, DeploymentRecord, RecordStore, relative_path,
};
use flowsmith_utils::atomic_write::write_file_atomic;
use flowsmith_utils::paths::is_single_segment;

use crate::error::DeployError;
use crate::shell::{RemoteSession, RemoteShell, shell_quote};

/// What is being delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub file_name: String,
    pub workflow_id: Option<String>,
    pub notes: Option<String>,
}

impl DeployTarget {
    /// Both names become path components under the destination base, so
    /// each must be a single segment.
    pub fn new(
        file_name: impl Into<String>,
        workflow_id: Option<String>,
    ) -> Result<Self, DeployError> {
        let file_name = file_name.into();
        if !is_single_segment(&file_name) {
            return Err(DeployError::InvalidTarget {
                field: "file name",
                value: file_name,
            });
        }
        let workflow_id = workflow_id.filter(|id| !id.is_empty());
        if let Some(id) = workflow_id.as_deref()
            && !is_single_segment(id)
        {
            return Err(DeployError::InvalidTarget {
                field: "workflow id",
                value: id.to_string(),
            });
        }
        Ok(Self {
            file_name,
            workflow_id,
            notes: None,
        })
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// `<workflow_id>/<file>` or `generated_files/<file>`
    #[must_use]
    pub fn relative_path(&self) -> String {
        relative_path(self.workflow_id.as_deref(), &self.file_name)
    }

    fn record(&self, connection: &str, content: &str, kind: DeployStrategyKind) -> DeploymentRecord {
        let mut record = DeploymentRecord::new(
            connection,
            &self.file_name,
            content,
            self.workflow_id.clone(),
            kind,
        );
        record.notes = self.notes.clone();
        record
    }
}

/// One way of getting an artifact onto the execution host
#[async_trait]
pub trait DeployStrategy: Send + Sync {
    fn kind(&self) -> DeployStrategyKind;

    /// Deliver `content`; a successful attempt returns its persisted record
    async fn attempt(
        &self,
        content: &str,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, DeployError>;
}

/// Writes into the first configured directory that exists locally
pub struct SharedStorageStrategy {
    store: RecordStore,
    dirs: Vec<Utf8PathBuf>,
    connection_name: String,
}

impl SharedStorageStrategy {
    #[must_use]
    pub fn new(store: RecordStore, dirs: Vec<Utf8PathBuf>, connection_name: impl Into<String>) -> Self {
        Self {
            store,
            dirs,
            connection_name: connection_name.into(),
        }
    }

    fn reachable_dir(&self) -> Option<&Utf8Path> {
        self.dirs.iter().map(Utf8PathBuf::as_path).find(|dir| dir.is_dir())
    }
}

#[async_trait]
impl DeployStrategy for SharedStorageStrategy {
    fn kind(&self) -> DeployStrategyKind {
        DeployStrategyKind::SharedStorage
    }

    async fn attempt(
        &self,
        content: &str,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, DeployError> {
        let dir = self
            .reachable_dir()
            .ok_or_else(|| DeployError::SharedStorageUnavailable {
                tried: self.dirs.iter().map(ToString::to_string).collect(),
            })?;
        let path = dir.join(target.relative_path());
        let write_failed = |reason: String| DeployError::SharedWriteFailed {
            path: path.to_string(),
            reason,
        };

        write_file_atomic(&path, content).map_err(|e| write_failed(format!("{e:#}")))?;
        let written = fs::metadata(&path).map_err(|e| write_failed(e.to_string()))?;
        if written.len() != content.len() as u64 {
            return Err(write_failed(format!(
                "size mismatch after write: expected {} bytes, found {}",
                content.len(),
                written.len()
            )));
        }

        let mut record = target.record(&self.connection_name, content, self.kind());
        record.local_path = Some(path.to_string());
        record.mark_completed()?;
        self.store.save(&record)?;
        info!(deployment = %record.id, path = %path, "Delivered via shared storage");
        Ok(record)
    }
}

/// Uploads over a [`RemoteShell`] to the managed connection
pub struct RemoteShellStrategy {
    store: RecordStore,
    shell: Arc<dyn RemoteShell>,
    template: ConnectionDescriptor,
}

impl RemoteShellStrategy {
    /// `template` names the connection and seeds it on first use; its
    /// password is applied to the stored descriptor on every attempt.
    #[must_use]
    pub fn new(store: RecordStore, shell: Arc<dyn RemoteShell>, template: ConnectionDescriptor) -> Self {
        Self {
            store,
            shell,
            template,
        }
    }

    async fn upload(
        session: &mut dyn RemoteSession,
        content: &str,
        remote_path: &str,
    ) -> Result<(), DeployError> {
        if let Some((dir, _)) = remote_path.rsplit_once('/')
            && !dir.is_empty()
            && !session.create_directory(dir).await.map_err(DeployError::remote)?
        {
            return Err(DeployError::remote(format!("could not create directory {dir}")));
        }

        session
            .upload_file_content(content, remote_path)
            .await
            .map_err(DeployError::remote)?;

        let check = format!("test -f {} && echo exists", shell_quote(remote_path));
        let verified = session
            .execute_command(&check)
            .await
            .map_err(DeployError::remote)?;
        if verified.stdout.trim() != "exists" {
            return Err(DeployError::UploadVerificationFailed {
                remote_path: remote_path.to_string(),
                record: None,
            });
        }
        Ok(())
    }

    fn finish_failed(&self, mut record: DeploymentRecord, err: DeployError) -> DeployError {
        if let Err(e) = record.mark_failed(err.to_string()) {
            warn!(deployment = %record.id, error = %e, "Could not mark deployment failed");
        }
        if let Err(e) = self.store.save(&record) {
            warn!(deployment = %record.id, error = %e, "Could not persist failed deployment");
        }
        warn!(deployment = %record.id, error = %err, "Remote deployment failed");
        err.with_record(record)
    }
}

#[async_trait]
impl DeployStrategy for RemoteShellStrategy {
    fn kind(&self) -> DeployStrategyKind {
        DeployStrategyKind::RemoteShell
    }

    async fn attempt(
        &self,
        content: &str,
        target: &DeployTarget,
    ) -> Result<DeploymentRecord, DeployError> {
        let (mut connection, _) = self.store.get_or_create_connection(self.template.clone())?;
        connection.password.clone_from(&self.template.password);

        let remote_path = connection.remote_path(&target.relative_path());
        let mut record = target.record(&connection.name, content, self.kind());
        record.remote_path = Some(remote_path.clone());
        self.store.save(&record)?;

        record.mark_uploading()?;
        self.store.save(&record)?;

        if !connection.is_active {
            let err = DeployError::connection(&connection.name, "connection is disabled");
            return Err(self.finish_failed(record, err));
        }

        let mut session = match self.shell.connect(&connection).await {
            Ok(session) => session,
            Err(e) => {
                let err = DeployError::connection(&connection.name, e);
                return Err(self.finish_failed(record, err));
            }
        };
        let outcome = Self::upload(session.as_mut(), content, &remote_path).await;
        session.close().await;

        match outcome {
            Ok(()) => {
                record.mark_completed()?;
                self.store.save(&record)?;
                info!(deployment = %record.id, remote_path = %remote_path, "Delivered via remote shell");
                Ok(record)
            }
            Err(err) => Err(self.finish_failed(record, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRemoteShell;
    use flowsmith_store::DeploymentStatus;
    use tempfile::TempDir;

    fn store() -> (TempDir, RecordStore, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, RecordStore::new(base.join("store")), base)
    }

    fn template() -> ConnectionDescriptor {
        let mut conn = ConnectionDescriptor::new("ml_runner", "ml_runner", "root", "/app/workflows");
        conn.password = Some("pw".to_string());
        conn
    }

    #[tokio::test]
    async fn test_shared_storage_writes_first_existing_dir() {
        let (_dir, store, base) = store();
        let shared = base.join("shared");
        fs::create_dir_all(&shared).unwrap();
        let strategy = SharedStorageStrategy::new(
            store.clone(),
            vec![base.join("missing"), shared.clone()],
            "ml_runner",
        );

        let target = DeployTarget::new("model.py", Some("42".to_string())).unwrap();
        let record = strategy.attempt("x=2\n", &target).await.unwrap();

        let expected = shared.join("42/model.py");
        assert_eq!(fs::read_to_string(&expected).unwrap(), "x=2\n");
        assert_eq!(record.status, DeploymentStatus::Completed);
        assert_eq!(record.local_path.as_deref(), Some(expected.as_str()));
        let stored: DeploymentRecord = store.load(&record.id.to_string()).unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_shared_storage_unavailable() {
        let (_dir, store, base) = store();
        let strategy = SharedStorageStrategy::new(store.clone(), vec![base.join("nope")], "ml_runner");
        let err = strategy
            .attempt("x", &DeployTarget::new("a.py", None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::SharedStorageUnavailable { .. }));
        assert!(store.list::<DeploymentRecord>().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_upload_completes_and_closes() {
        let (_dir, store, _) = store();
        let shell = Arc::new(MockRemoteShell::new());
        let strategy = RemoteShellStrategy::new(store.clone(), shell.clone(), template());

        let record = strategy
            .attempt("x=2\n", &DeployTarget::new("model.py", None).unwrap())
            .await
            .unwrap();

        assert_eq!(record.status, DeploymentStatus::Completed);
        assert_eq!(
            record.remote_path.as_deref(),
            Some("/app/workflows/generated_files/model.py")
        );
        assert_eq!(
            shell.uploaded("/app/workflows/generated_files/model.py").as_deref(),
            Some("x=2\n")
        );
        assert_eq!(shell.connect_count(), 1);
        assert_eq!(shell.close_count(), 1);
        assert_eq!(shell.last_password().as_deref(), Some("pw"));
        assert!(store.find::<ConnectionDescriptor>("ml_runner").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_connect_failure_persists_failed_record() {
        let (_dir, store, _) = store();
        let shell = Arc::new(MockRemoteShell::new().refuse_connections());
        let strategy = RemoteShellStrategy::new(store.clone(), shell.clone(), template());

        let err = strategy
            .attempt("x", &DeployTarget::new("model.py", Some("42".to_string())).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::ConnectionFailed { .. }));
        let failed = err.record().unwrap();
        assert_eq!(failed.status, DeploymentStatus::Failed);
        let stored: DeploymentRecord = store.load(&failed.id.to_string()).unwrap();
        assert_eq!(stored.status, DeploymentStatus::Failed);
        assert!(stored.error_message.unwrap().contains("ml_runner"));
        assert_eq!(shell.close_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_after_upload_fails_verification() {
        let (_dir, store, _) = store();
        let shell = Arc::new(MockRemoteShell::new().lose_uploads());
        let strategy = RemoteShellStrategy::new(store.clone(), shell.clone(), template());

        let err = strategy
            .attempt("x", &DeployTarget::new("model.py", None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::UploadVerificationFailed { .. }));
        assert_eq!(err.record().unwrap().status, DeploymentStatus::Failed);
        assert_eq!(shell.close_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_connection_is_not_contacted() {
        let (_dir, store, _) = store();
        let mut disabled = template();
        disabled.is_active = false;
        disabled.password = None;
        store.save(&disabled).unwrap();

        let shell = Arc::new(MockRemoteShell::new());
        let strategy = RemoteShellStrategy::new(store, shell.clone(), template());
        let err = strategy
            .attempt("x", &DeployTarget::new("model.py", None).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::ConnectionFailed { .. }));
        assert_eq!(shell.connect_count(), 0);
    }
}
