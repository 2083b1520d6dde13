use thiserror::Error;

use flowsmith_artifacts::ArtifactError;
use flowsmith_llm::LlmError;
use flowsmith_store::StoreError;
use flowsmith_utils::{ErrorCategory, ErrorKind, UserFriendlyError};

/// Pipeline errors surfaced to callers.
///
/// Vendor failures during a call are not errors here; they end up as a
/// persisted `failed` status on the record.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Invalid {what} id '{id}'")]
    InvalidId { what: &'static str, id: String },

    #[error("Prompt must not be empty")]
    EmptyPrompt,
}

impl EngineError {
    pub(crate) fn invalid_id(what: &'static str, id: &str) -> Self {
        Self::InvalidId {
            what,
            id: id.to_string(),
        }
    }

    fn inner(&self) -> Option<&dyn UserFriendlyError> {
        match self {
            Self::Llm(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Artifact(e) => Some(e),
            Self::InvalidId { .. } | Self::EmptyPrompt => None,
        }
    }
}

impl UserFriendlyError for EngineError {
    fn user_message(&self) -> String {
        self.inner()
            .map_or_else(|| self.to_string(), UserFriendlyError::user_message)
    }

    fn context(&self) -> Option<String> {
        self.inner().and_then(UserFriendlyError::context)
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidId { what, .. } => {
                vec![format!("Ids are UUIDs; list {what}s to find one")]
            }
            Self::EmptyPrompt => vec!["Pass the prompt as an argument or on stdin".to_string()],
            _ => self
                .inner()
                .map(UserFriendlyError::suggestions)
                .unwrap_or_default(),
        }
    }

    fn category(&self) -> ErrorCategory {
        self.inner()
            .map_or(ErrorCategory::Validation, UserFriendlyError::category)
    }

    fn kind(&self) -> ErrorKind {
        self.inner()
            .map_or(ErrorKind::InvalidArguments, UserFriendlyError::kind)
    }
}
