use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flowsmith_llm::Role;

use crate::error::StoreError;
use crate::store::Record;

/// Status of an LLM call, shared by requests and analyses.
///
/// `pending → processing → {completed, failed}`; the only way back is a
/// retry from `failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome fields of one LLM call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub status: RequestStatus,
    pub response: Option<String>,
    pub error_message: Option<String>,
    /// `None` when the vendor does not report usage
    pub tokens_used: Option<u64>,
    pub response_time_ms: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for CallResult {
    fn default() -> Self {
        Self {
            status: RequestStatus::Pending,
            response: None,
            error_message: None,
            tokens_used: None,
            response_time_ms: None,
            completed_at: None,
        }
    }
}

impl CallResult {
    fn invalid(&self, collection: &str, id: &str, action: &str) -> StoreError {
        StoreError::InvalidState {
            collection: collection.to_string(),
            id: id.to_string(),
            status: self.status.to_string(),
            action: action.to_string(),
        }
    }

    /// `pending → processing`
    pub fn start(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        if self.status != RequestStatus::Pending {
            return Err(self.invalid(collection, id, "start"));
        }
        self.status = RequestStatus::Processing;
        Ok(())
    }

    /// `processing → completed`
    pub fn complete(
        &mut self,
        collection: &str,
        id: &str,
        response: String,
        tokens_used: Option<u64>,
        response_time_ms: u64,
    ) -> Result<(), StoreError> {
        if self.status != RequestStatus::Processing {
            return Err(self.invalid(collection, id, "complete"));
        }
        self.status = RequestStatus::Completed;
        self.response = Some(response);
        self.error_message = None;
        self.tokens_used = tokens_used;
        self.response_time_ms = Some(response_time_ms);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `{pending, processing} → failed`
    pub fn fail(
        &mut self,
        collection: &str,
        id: &str,
        error: impl Into<String>,
        response_time_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(self.invalid(collection, id, "fail"));
        }
        self.status = RequestStatus::Failed;
        self.error_message = Some(error.into());
        self.response_time_ms = response_time_ms;
        Ok(())
    }

    /// `failed → pending`, clearing every outcome field
    pub fn reset_for_retry(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        if self.status != RequestStatus::Failed {
            return Err(self.invalid(collection, id, "retry"));
        }
        *self = Self::default();
        Ok(())
    }
}

/// One persisted LLM invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestRecord {
    pub id: Uuid,
    /// Stored as given so requests naming an unknown provider stay auditable
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub system_message: Option<String>,
    pub conversation_id: Option<Uuid>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub result: CallResult,
    pub created_at: DateTime<Utc>,
}

impl LlmRequestRecord {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            system_message: None,
            conversation_id: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: None,
            result: CallResult::default(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.result.status
    }
}

impl Record for LlmRequestRecord {
    const COLLECTION: &'static str = "requests";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A message in a conversation; insertion order is canonical
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only message history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            provider: None,
            model: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append the user prompt and the assistant reply of one completed exchange
    pub fn record_exchange(&mut self, prompt: &str, response: &str) {
        let now = Utc::now();
        self.messages.push(ConversationMessage {
            role: Role::User,
            content: prompt.to_string(),
            created_at: now,
        });
        self.messages.push(ConversationMessage {
            role: Role::Assistant,
            content: response.to_string(),
            created_at: now,
        });
        self.updated_at = now;
    }
}

impl Record for Conversation {
    const COLLECTION: &'static str = "conversations";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_defaults() {
        let record = LlmRequestRecord::new("openai", "gpt-4o", "hi");
        assert_eq!(record.status(), RequestStatus::Pending);
        assert!((record.temperature - 0.7).abs() < f32::EPSILON);
        assert!(record.result.tokens_used.is_none());
    }

    #[test]
    fn test_forward_transitions() {
        let mut result = CallResult::default();
        result.start("requests", "x").unwrap();
        result
            .complete("requests", "x", "ok".to_string(), Some(12), 40)
            .unwrap();
        assert_eq!(result.status, RequestStatus::Completed);
        assert!(result.completed_at.is_some());

        // Terminal states do not move again
        assert!(result.fail("requests", "x", "late", None).is_err());
        assert!(result.start("requests", "x").is_err());
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut result = CallResult::default();
        let err = result.reset_for_retry("requests", "x").unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { ref status, .. } if status == "pending"));

        result.start("requests", "x").unwrap();
        result.fail("requests", "x", "boom", Some(5)).unwrap();
        result.reset_for_retry("requests", "x").unwrap();
        assert_eq!(result, CallResult::default());
    }

    #[test]
    fn test_flattened_json_shape() {
        let record = LlmRequestRecord::new("gemini", "gemini-2.5-flash", "hi");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("result").is_none());
        let back: LlmRequestRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_exchange_order() {
        let mut conversation = Conversation::new("chat");
        conversation.record_exchange("q", "a");
        let roles: Vec<Role> = conversation.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(conversation.messages[1].content, "a");
    }
}
