use thiserror::Error;

use flowsmith_utils::{ErrorCategory, ErrorKind, UserFriendlyError};

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: String, id: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Corrupt record at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Cannot {action} {collection} '{id}' while it is {status}")]
    InvalidState {
        collection: String,
        id: String,
        status: String,
        action: String,
    },

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),

    #[error("Failed to lock {path}: {reason}")]
    Lock { path: String, reason: String },
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { collection, .. } => Some(format!(
                "Records are stored under <store>/{collection}/<id>.json."
            )),
            Self::Corrupt { .. } => {
                Some("The file exists but is not a valid record.".to_string())
            }
            Self::InvalidState { .. } => Some(
                "Only failed records can be retried; completed records are final.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec!["List records to find a valid id".to_string()],
            Self::Read { .. } | Self::Write { .. } | Self::Lock { .. } => vec![
                "Check permissions on the store directory".to_string(),
                "Point --store at a writable location".to_string(),
            ],
            Self::Corrupt { path, .. } => vec![format!("Inspect or remove {path}")],
            Self::InvalidState { .. } => {
                vec!["Create a new record instead of retrying this one".to_string()]
            }
            Self::InvalidKey(_) => vec![
                "Use letters, digits, '-', '_' or '.' in record names".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidState { .. } | Self::InvalidKey(_) => ErrorCategory::Validation,
            _ => ErrorCategory::FileSystem,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InvalidKey(_) => ErrorKind::InvalidArguments,
            _ => ErrorKind::Storage,
        }
    }
}
