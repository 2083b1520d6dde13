//! Normalized request and result types shared by every adapter

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Capitalized label used when a conversation is flattened into text
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Normalized request handed to an adapter.
///
/// `messages` is the full ordered context (system, history, prompt). The
/// system message is repeated in `system` so adapters that take it as a
/// separate field do not have to search for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// Model name; empty selects the provider's default
    pub model: String,
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

/// Successful vendor reply
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Vendor-reported usage; `None` when the vendor does not report it
    pub tokens_used: Option<u64>,
    pub model: String,
}

/// Normalized result of one dispatch.
///
/// Vendor errors never escape an adapter as `Err`; they arrive here as
/// `Failed` with the vendor's message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Completed {
        completion: Completion,
        elapsed_ms: u64,
    },
    Failed {
        error: String,
        elapsed_ms: u64,
    },
}

impl ProviderOutcome {
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Completed { elapsed_ms, .. } | Self::Failed { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_role_parse_and_label() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.label(), "Assistant");
    }

    #[test]
    fn test_outcome_elapsed() {
        let failed = ProviderOutcome::Failed {
            error: "boom".to_string(),
            elapsed_ms: 12,
        };
        assert_eq!(failed.elapsed_ms(), 12);
        assert!(!failed.is_completed());
    }
}
