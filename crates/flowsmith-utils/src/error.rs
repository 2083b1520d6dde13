use std::fmt;
use thiserror::Error;

use crate::redaction::redact_secrets;

/// Pipeline-wide error taxonomy.
///
/// Every crate-level error enum maps onto exactly one kind so that the CLI,
/// persisted records, and tests can reason about failures without matching on
/// crate-specific variants.
///
/// | Kind | Raised when |
/// |------|-------------|
/// | `CredentialMissing` | provider key unset or still the documented placeholder |
/// | `UnsupportedProvider` | provider name outside the closed set |
/// | `InvalidArguments` | resolver called with no keys, or malformed caller input |
/// | `NotFound` | artifact or record cannot be located |
/// | `ArtifactUnreadable` | a resolved artifact vanished before it was read |
/// | `VendorCallFailed` | network or API error from an LLM vendor |
/// | `ConnectionFailed` | remote-shell connect or authentication failure |
/// | `UploadVerificationFailed` | remote existence check negative after upload |
/// | `InvalidState` | state transition not permitted (e.g. retrying a completed record) |
/// | `SharedStorageUnavailable` | no shared directory reachable from this process |
/// | `Storage` | record store or local filesystem failure |
/// | `Configuration` | invalid or unreadable configuration |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    CredentialMissing,
    UnsupportedProvider,
    InvalidArguments,
    NotFound,
    ArtifactUnreadable,
    VendorCallFailed,
    ConnectionFailed,
    UploadVerificationFailed,
    InvalidState,
    SharedStorageUnavailable,
    Storage,
    Configuration,
}

impl ErrorKind {
    /// Whether the kind indicates a caller mistake rather than an environmental failure.
    #[must_use]
    pub const fn is_caller_error(self) -> bool {
        matches!(
            self,
            Self::UnsupportedProvider
                | Self::InvalidArguments
                | Self::InvalidState
                | Self::Configuration
        )
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;

    /// Taxonomy kind of this error
    fn kind(&self) -> ErrorKind;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    LlmProvider,
    Artifact,
    Deployment,
    FileSystem,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::LlmProvider => write!(f, "LLM Provider"),
            Self::Artifact => write!(f, "Artifact"),
            Self::Deployment => write!(f, "Deployment"),
            Self::FileSystem => write!(f, "File System"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Render an error with context and suggestions for terminal output.
///
/// Format:
/// ```text
/// Error: <user message>
///
/// Context: <context>
///
/// Suggestions:
///   • <suggestion 1>
/// ```
///
/// The rendered text passes through secret redaction before it is returned.
#[must_use]
pub fn display_for_user(err: &dyn UserFriendlyError) -> String {
    let mut output = String::new();

    output.push_str(&format!("Error: {}\n", err.user_message()));

    if let Some(ctx) = err.context() {
        output.push_str(&format!("\nContext: {}\n", ctx));
    }

    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        output.push_str("\nSuggestions:\n");
        for suggestion in suggestions {
            output.push_str(&format!("  • {}\n", suggestion));
        }
    }

    redact_secrets(&output)
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [llm], [artifacts], [store], [deploy] and [improvement] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "flowsmith searches for .flowsmith/config.toml starting from the current directory upward."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Remove unknown sections or keys".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "llm.default_provider" => vec![
                    "Use one of 'openai', 'anthropic' or 'gemini'".to_string(),
                ],
                "improvement.temperature" => {
                    vec!["Use a value between 0.0 and 2.0".to_string()]
                }
                "deploy.connection.port" => vec!["Use a port between 1 and 65535".to_string()],
                _ => vec![
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .flowsmith/config.toml in your project root".to_string(),
                "Pass --config <path> to point at an explicit file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Pass --config <path> to skip discovery".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::CredentialMissing.to_string(), "credential_missing");
        assert_eq!(
            ErrorKind::UploadVerificationFailed.as_ref(),
            "upload_verification_failed"
        );
    }

    #[test]
    fn test_error_kind_names_are_unique() {
        let names: std::collections::HashSet<String> =
            ErrorKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names.len(), ErrorKind::iter().count());
    }

    #[test]
    fn test_caller_errors() {
        assert!(ErrorKind::InvalidArguments.is_caller_error());
        assert!(ErrorKind::UnsupportedProvider.is_caller_error());
        assert!(!ErrorKind::ConnectionFailed.is_caller_error());
        assert!(!ErrorKind::VendorCallFailed.is_caller_error());
    }

    #[test]
    fn test_display_for_user_includes_suggestions() {
        let err = ConfigError::InvalidValue {
            key: "llm.default_provider".to_string(),
            value: "mistral".to_string(),
        };
        let rendered = display_for_user(&err);
        assert!(rendered.starts_with("Error: Configuration 'llm.default_provider'"));
        assert!(rendered.contains("Suggestions:"));
        assert!(rendered.contains("'openai'"));
    }

    #[test]
    fn test_display_for_user_redacts_keys() {
        let err = ConfigError::InvalidFile(
            "bad value sk-abcdefghijklmnopqrstuvwxyz0123456789ABCD".to_string(),
        );
        let rendered = display_for_user(&err);
        assert!(!rendered.contains("sk-abcdefghijklmnopqrstuvwxyz0123456789ABCD"));
        assert!(rendered.contains("[REDACTED_KEY]"));
    }
}
