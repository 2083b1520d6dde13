use std::time::Duration;
use thiserror::Error;

use flowsmith_utils::{ErrorCategory, ErrorKind, UserFriendlyError};

/// Errors raised by provider dispatch.
///
/// `CredentialMissing` and `UnsupportedProvider` are raised before any network
/// call. The remaining variants come from the vendor round trip and are
/// converted into a failed [`crate::ProviderOutcome`] by the registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// API key unset, empty, or still the documented placeholder
    #[error("{provider} API key not configured (set {env_var})")]
    CredentialMissing { provider: String, env_var: String },

    /// Provider name outside the supported set
    #[error("Provider '{0}' is not supported (available: openai, anthropic, gemini)")]
    UnsupportedProvider(String),

    /// Network or API failure; `message` is the vendor's own text when available
    #[error("{provider} call failed: {message}")]
    VendorCallFailed {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The per-request timeout elapsed
    #[error("{provider} call timed out after {duration:?}")]
    Timeout { provider: String, duration: Duration },

    /// Adapter could not be constructed from its settings
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::CredentialMissing { provider, env_var } => {
                format!("No API key configured for {provider}; {env_var} is unset or a placeholder")
            }
            Self::UnsupportedProvider(name) => format!("Unknown LLM provider '{name}'"),
            Self::VendorCallFailed {
                provider, message, ..
            } => format!("{provider} returned an error: {message}"),
            Self::Timeout { provider, duration } => {
                format!("{provider} did not answer within {}s", duration.as_secs())
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::CredentialMissing { .. } => Some(
                "Keys are read from the environment variable named by [llm.<provider>] api_key_env."
                    .to_string(),
            ),
            Self::VendorCallFailed { status: Some(code), .. } => {
                Some(format!("The vendor answered with HTTP status {code}."))
            }
            Self::Timeout { .. } => Some(
                "The timeout is set by [llm] request_timeout_secs and applies to every call."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::CredentialMissing { env_var, .. } => vec![
                format!("Export {env_var} with a real key"),
                "Pick another provider with --provider".to_string(),
            ],
            Self::UnsupportedProvider(_) => {
                vec!["Use one of: openai, anthropic, gemini".to_string()]
            }
            Self::VendorCallFailed { status, .. } => match status {
                Some(401) | Some(403) => vec!["Check that the API key is valid".to_string()],
                Some(429) => vec!["Wait and retry the request".to_string()],
                _ => vec!["Retry the request with the retry command".to_string()],
            },
            Self::Timeout { .. } => vec![
                "Retry the request".to_string(),
                "Raise [llm] request_timeout_secs".to_string(),
            ],
            Self::Misconfiguration(_) => {
                vec!["Review the [llm] section of .flowsmith/config.toml".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialMissing { .. } | Self::Misconfiguration(_) => {
                ErrorCategory::Configuration
            }
            Self::UnsupportedProvider(_) => ErrorCategory::Validation,
            _ => ErrorCategory::LlmProvider,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialMissing { .. } => ErrorKind::CredentialMissing,
            Self::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Self::VendorCallFailed { .. } | Self::Timeout { .. } => ErrorKind::VendorCallFailed,
            Self::Misconfiguration(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let missing = LlmError::CredentialMissing {
            provider: "openai".to_string(),
            env_var: "OPENAI_API_KEY".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::CredentialMissing);
        assert_eq!(
            LlmError::UnsupportedProvider("x".to_string()).kind(),
            ErrorKind::UnsupportedProvider
        );
        assert_eq!(
            LlmError::Timeout {
                provider: "gemini".to_string(),
                duration: Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::VendorCallFailed
        );
    }

    #[test]
    fn test_vendor_message_is_preserved() {
        let err = LlmError::VendorCallFailed {
            provider: "anthropic".to_string(),
            status: Some(400),
            message: "max_tokens: Field required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "anthropic call failed: max_tokens: Field required"
        );
    }
}
