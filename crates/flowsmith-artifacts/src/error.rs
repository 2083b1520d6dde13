use std::collections::BTreeMap;
use thiserror::Error;

use flowsmith_utils::{ErrorCategory, ErrorKind, UserFriendlyError};

/// Artifact resolution and access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// None of workflow id, file name or file path was supplied
    #[error("Provide at least one of workflow id, file name or file path")]
    InvalidArguments,

    /// A workflow id that is not a single directory name
    #[error("Invalid workflow id '{0}': must be a single directory name")]
    InvalidWorkflowId(String),

    /// Nothing matched; `available` maps each workflow id to its source files
    #[error("{message}")]
    NotFound {
        message: String,
        available: BTreeMap<String, Vec<String>>,
    },

    /// The workflow directory is missing; `reason` reflects the upstream status
    #[error("Workflow {workflow_id} {reason}")]
    WorkflowUnavailable { workflow_id: String, reason: String },

    /// A resolved path could not be read
    #[error("Cannot read artifact {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// The upstream generation record could not be read
    #[error("Failed to read generation record {path}: {reason}")]
    Lookup { path: String, reason: String },

    #[error("Failed to write artifact {path}: {reason}")]
    Write { path: String, reason: String },
}

impl ArtifactError {
    /// Build a `NotFound` whose message enumerates what does exist
    #[must_use]
    pub fn not_found(available: BTreeMap<String, Vec<String>>) -> Self {
        let message = if available.is_empty() {
            "Workflow file not found; no generated workflows exist yet".to_string()
        } else {
            let listed: Vec<String> = available
                .iter()
                .map(|(id, files)| format!("{id} ({})", files.join(", ")))
                .collect();
            format!(
                "Workflow file not found. Available workflows: {}",
                listed.join(", ")
            )
        };
        Self::NotFound { message, available }
    }
}

impl UserFriendlyError for ArtifactError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } | Self::WorkflowUnavailable { .. } => Some(
                "Workflows are looked up under [artifacts] root as <workflow_id>/<file>."
                    .to_string(),
            ),
            Self::Unreadable { .. } => {
                Some("The file was resolved but vanished or became unreadable.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidArguments => {
                vec!["Pass --workflow-id, --file-name or --file-path".to_string()]
            }
            Self::InvalidWorkflowId(_) => {
                vec!["Workflow ids cannot contain '/', '\\' or be '.' or '..'".to_string()]
            }
            Self::NotFound { .. } => vec![
                "Run 'flowsmith artifacts list' to see available workflows".to_string(),
            ],
            Self::WorkflowUnavailable { workflow_id, .. } => vec![format!(
                "Check progress with 'flowsmith artifacts status {workflow_id}'"
            )],
            Self::Unreadable { .. } | Self::Write { .. } => {
                vec!["Check the file permissions".to_string()]
            }
            Self::Lookup { .. } => {
                vec!["Check [artifacts] generations_dir in the configuration".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArguments | Self::InvalidWorkflowId(_) => ErrorCategory::Validation,
            Self::Unreadable { .. } | Self::Write { .. } | Self::Lookup { .. } => {
                ErrorCategory::FileSystem
            }
            _ => ErrorCategory::Artifact,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments | Self::InvalidWorkflowId(_) => ErrorKind::InvalidArguments,
            Self::NotFound { .. } | Self::WorkflowUnavailable { .. } => ErrorKind::NotFound,
            Self::Unreadable { .. } => ErrorKind::ArtifactUnreadable,
            Self::Lookup { .. } | Self::Write { .. } => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_enumerates_alternatives() {
        let mut available = BTreeMap::new();
        available.insert("a1".to_string(), vec!["flow.py".to_string()]);
        available.insert(
            "b2".to_string(),
            vec!["x.py".to_string(), "y.py".to_string()],
        );
        let err = ArtifactError::not_found(available);
        assert_eq!(
            err.to_string(),
            "Workflow file not found. Available workflows: a1 (flow.py), b2 (x.py, y.py)"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_arguments_is_distinct() {
        assert_eq!(ArtifactError::InvalidArguments.kind(), ErrorKind::InvalidArguments);
    }
}
