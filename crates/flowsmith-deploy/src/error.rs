use thiserror::Error;

use flowsmith_store::{DeploymentRecord, StoreError};
use flowsmith_utils::{ErrorCategory, ErrorKind, UserFriendlyError};

/// Failure talking to a remote host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("Could not connect to {destination}: {reason}")]
    Connect { destination: String, reason: String },

    #[error("Remote command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Transfer to {remote_path} failed: {reason}")]
    Transfer { remote_path: String, reason: String },

    #[error("Required program '{program}' is not installed")]
    MissingTool { program: String },
}

/// Deployment errors.
///
/// Remote failures carry the persisted failed [`DeploymentRecord`] so callers
/// can report its id.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("No shared deployment directory is reachable (tried: {})", tried.join(", "))]
    SharedStorageUnavailable { tried: Vec<String> },

    #[error("Failed to write {path}: {reason}")]
    SharedWriteFailed { path: String, reason: String },

    #[error("Connection '{connection}' failed: {reason}")]
    ConnectionFailed {
        connection: String,
        reason: String,
        record: Option<Box<DeploymentRecord>>,
    },

    #[error("Remote operation failed: {reason}")]
    RemoteCommandFailed {
        reason: String,
        record: Option<Box<DeploymentRecord>>,
    },

    #[error("File upload failed - file not found after upload: {remote_path}")]
    UploadVerificationFailed {
        remote_path: String,
        record: Option<Box<DeploymentRecord>>,
    },

    #[error("Deployment {id} cannot be retried while it is {status}")]
    NotRetryable { id: String, status: String },

    #[error("Invalid deployment id '{0}'")]
    InvalidId(String),

    #[error("Invalid {field} '{value}': must be a single path component")]
    InvalidTarget { field: &'static str, value: String },

    #[error("No deployment strategy is configured")]
    NoStrategy,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeployError {
    /// The persisted record of the failed attempt, if one was written
    #[must_use]
    pub fn record(&self) -> Option<&DeploymentRecord> {
        match self {
            Self::ConnectionFailed { record, .. }
            | Self::RemoteCommandFailed { record, .. }
            | Self::UploadVerificationFailed { record, .. } => record.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub(crate) fn with_record(mut self, failed: DeploymentRecord) -> Self {
        match &mut self {
            Self::ConnectionFailed { record, .. }
            | Self::RemoteCommandFailed { record, .. }
            | Self::UploadVerificationFailed { record, .. } => {
                *record = Some(Box::new(failed));
            }
            _ => {}
        }
        self
    }

    pub(crate) fn connection(connection: &str, err: impl std::fmt::Display) -> Self {
        Self::ConnectionFailed {
            connection: connection.to_string(),
            reason: err.to_string(),
            record: None,
        }
    }

    pub(crate) fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteCommandFailed {
            reason: err.to_string(),
            record: None,
        }
    }
}

impl UserFriendlyError for DeployError {
    fn user_message(&self) -> String {
        match self {
            Self::Store(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::SharedStorageUnavailable { .. } => Some(
                "Shared directories are tried first; the remote upload is the fallback."
                    .to_string(),
            ),
            Self::ConnectionFailed { .. } => Some(
                "Remote delivery shells out to ssh and scp (sshpass for password auth)."
                    .to_string(),
            ),
            Self::Store(err) => err.context(),
            _ => None,
        }
        .map(|context| match self.record() {
            Some(record) => format!("{context} Deployment record: {}", record.id),
            None => context,
        })
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::SharedStorageUnavailable { .. } => {
                vec!["Mount a shared directory or list it under [deploy] shared_dirs".to_string()]
            }
            Self::ConnectionFailed { .. } => vec![
                "Run 'flowsmith connection test' to check the host".to_string(),
                "Set the password variable from [deploy.connection] password_env or a private_key_path"
                    .to_string(),
            ],
            Self::UploadVerificationFailed { .. } | Self::RemoteCommandFailed { .. } => {
                vec!["Check free space and permissions under the remote base path".to_string()]
            }
            Self::NotRetryable { .. } => {
                vec!["Only failed or pending deployments can be retried".to_string()]
            }
            Self::InvalidId(_) => vec!["Deployment ids are UUIDs; see 'flowsmith deploy list'".to_string()],
            Self::InvalidTarget { .. } => {
                vec!["Use a plain file name and workflow id without '/', '\\' or '..'".to_string()]
            }
            Self::Store(err) => err.suggestions(),
            Self::SharedWriteFailed { .. } | Self::NoStrategy => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidId(_) | Self::InvalidTarget { .. } => ErrorCategory::Validation,
            Self::Store(err) => err.category(),
            Self::SharedWriteFailed { .. } => ErrorCategory::FileSystem,
            Self::NoStrategy => ErrorCategory::Configuration,
            _ => ErrorCategory::Deployment,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::SharedStorageUnavailable { .. } => ErrorKind::SharedStorageUnavailable,
            Self::SharedWriteFailed { .. } => ErrorKind::Storage,
            Self::ConnectionFailed { .. } | Self::RemoteCommandFailed { .. } => {
                ErrorKind::ConnectionFailed
            }
            Self::UploadVerificationFailed { .. } => ErrorKind::UploadVerificationFailed,
            Self::NotRetryable { .. } => ErrorKind::InvalidState,
            Self::InvalidId(_) | Self::InvalidTarget { .. } => ErrorKind::InvalidArguments,
            Self::NoStrategy => ErrorKind::Configuration,
            Self::Store(err) => err.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_store::DeployStrategyKind;

    #[test]
    fn test_record_attached_to_remote_failures() {
        let record = DeploymentRecord::new(
            "ml_runner",
            "model.py",
            "x=1",
            None,
            DeployStrategyKind::RemoteShell,
        );
        let id = record.id;
        let err = DeployError::connection("ml_runner", "refused").with_record(record);
        assert_eq!(err.record().map(|r| r.id), Some(id));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.context().unwrap().contains(&id.to_string()));
    }

    #[test]
    fn test_with_record_ignores_local_errors() {
        let record = DeploymentRecord::new(
            "ml_runner",
            "model.py",
            "x=1",
            None,
            DeployStrategyKind::SharedStorage,
        );
        let err = DeployError::NoStrategy.with_record(record);
        assert!(err.record().is_none());
    }

    #[test]
    fn test_verification_message() {
        let err = DeployError::UploadVerificationFailed {
            remote_path: "/app/workflows/42/model.py".to_string(),
            record: None,
        };
        assert!(err.to_string().starts_with("File upload failed - file not found after upload"));
        assert_eq!(err.kind(), ErrorKind::UploadVerificationFailed);
    }
}
