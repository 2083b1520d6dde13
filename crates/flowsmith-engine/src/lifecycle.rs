//! Persisted LLM requests: `pending → processing → {completed, failed}`.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use flowsmith_llm::{ChatRequest, ProviderOutcome, ProviderRegistry};
use flowsmith_store::{Conversation, LlmRequestRecord, Record, RecordStore, StoreError};

use crate::context::build_context;
use crate::error::EngineError;

/// Caller input for a new request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRequest {
    /// Provider name; the configured default when absent
    pub provider: Option<String>,
    /// Model name; the provider's default when absent
    pub model: Option<String>,
    pub prompt: String,
    pub system_message: Option<String>,
    pub conversation_id: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl NewRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

pub(crate) fn parse_id(what: &'static str, id: &str) -> Result<Uuid, EngineError> {
    Uuid::parse_str(id.trim()).map_err(|_| EngineError::invalid_id(what, id))
}

/// Drives LLM requests through their lifecycle and keeps conversations in step
pub struct RequestLifecycle {
    store: RecordStore,
    registry: Arc<ProviderRegistry>,
    // Conversation updates are read-modify-write on one file
    conversation_lock: Mutex<()>,
}

impl RequestLifecycle {
    #[must_use]
    pub fn new(store: RecordStore, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            store,
            registry,
            conversation_lock: Mutex::new(()),
        }
    }

    /// Persist a `pending` request.
    ///
    /// The provider name is stored as given; an unsupported one fails the
    /// request when it is processed.
    pub fn create(&self, new: NewRequest) -> Result<LlmRequestRecord, EngineError> {
        if new.prompt.trim().is_empty() {
            return Err(EngineError::EmptyPrompt);
        }
        let provider = new
            .provider
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.registry.default_provider().to_string());
        let model = match new.model.filter(|m| !m.trim().is_empty()) {
            Some(model) => model,
            None => self
                .registry
                .effective_model(&provider, &ChatRequest::default())
                .unwrap_or_default(),
        };

        let mut record = LlmRequestRecord::new(provider, model, new.prompt);
        record.system_message = new.system_message.filter(|s| !s.trim().is_empty());
        if let Some(temperature) = new.temperature {
            record.temperature = temperature;
        }
        record.max_tokens = new.max_tokens;
        if let Some(id) = new.conversation_id {
            let conversation = self.conversation(&id)?;
            record.conversation_id = Some(conversation.id);
        }
        self.store.save(&record)?;
        info!(request_id = %record.id, provider = %record.provider, model = %record.model, "Created request");
        Ok(record)
    }

    /// Run a `pending` request once.
    ///
    /// Provider failures, including a missing credential or an unknown
    /// provider, are persisted as `failed` and returned as `Ok`.
    pub async fn process(&self, id: &str) -> Result<LlmRequestRecord, EngineError> {
        let mut record: LlmRequestRecord = self.store.load(&parse_id("request", id)?.to_string())?;
        let key = record.key();
        record.result.start(LlmRequestRecord::COLLECTION, &key)?;
        self.store.save(&record)?;

        let history = match record.conversation_id {
            Some(conversation_id) => {
                match self.store.load::<Conversation>(&conversation_id.to_string()) {
                    Ok(conversation) => conversation.messages,
                    Err(e) => {
                        record
                            .result
                            .fail(LlmRequestRecord::COLLECTION, &key, e.to_string(), None)?;
                        self.store.save(&record)?;
                        warn!(request_id = %record.id, error = %e, "Conversation history unavailable");
                        return Ok(record);
                    }
                }
            }
            None => Vec::new(),
        };
        let request = ChatRequest {
            model: record.model.clone(),
            messages: build_context(record.system_message.as_deref(), &history, &record.prompt),
            system: record.system_message.clone(),
            max_tokens: record.max_tokens,
            temperature: record.temperature,
        };

        match self.registry.dispatch(&record.provider, &request).await {
            Ok(ProviderOutcome::Completed {
                completion,
                elapsed_ms,
            }) => {
                let mut completed = record.clone();
                if completed.model.is_empty() {
                    completed.model.clone_from(&completion.model);
                }
                completed.result.complete(
                    LlmRequestRecord::COLLECTION,
                    &key,
                    completion.text.clone(),
                    completion.tokens_used,
                    elapsed_ms,
                )?;
                match self.persist_completion(&completed, &completion.text).await {
                    Ok(()) => {
                        record = completed;
                        info!(
                            request_id = %record.id,
                            status = %record.status(),
                            tokens = ?record.result.tokens_used,
                            "Request completed"
                        );
                    }
                    Err(e) => {
                        record.result.fail(
                            LlmRequestRecord::COLLECTION,
                            &key,
                            format!("Failed to record the exchange: {e}"),
                            Some(elapsed_ms),
                        )?;
                        self.store.save(&record)?;
                        warn!(request_id = %record.id, error = %e, "Request failed after completion");
                    }
                }
            }
            Ok(ProviderOutcome::Failed { error, elapsed_ms }) => {
                record
                    .result
                    .fail(LlmRequestRecord::COLLECTION, &key, error, Some(elapsed_ms))?;
                self.store.save(&record)?;
                warn!(request_id = %record.id, status = %record.status(), "Request failed");
            }
            Err(e) => {
                record
                    .result
                    .fail(LlmRequestRecord::COLLECTION, &key, e.to_string(), None)?;
                self.store.save(&record)?;
                warn!(request_id = %record.id, error = %e, "Request rejected before dispatch");
            }
        }
        Ok(record)
    }

    /// Save a completed request together with its conversation exchange.
    ///
    /// The conversation is written first and restored if the request cannot
    /// be saved, so messages never outlive a request that stayed `processing`.
    async fn persist_completion(
        &self,
        record: &LlmRequestRecord,
        response: &str,
    ) -> Result<(), StoreError> {
        let Some(conversation_id) = record.conversation_id else {
            return self.store.save(record);
        };
        let _guard = self.conversation_lock.lock().await;
        let before: Conversation = self.store.load(&conversation_id.to_string())?;
        let mut after = before.clone();
        after.record_exchange(&record.prompt, response);
        self.store.save(&after)?;
        if let Err(e) = self.store.save(record) {
            self.store.save(&before)?;
            return Err(e);
        }
        Ok(())
    }

    /// Create and process in one step
    pub async fn submit(&self, new: NewRequest) -> Result<LlmRequestRecord, EngineError> {
        let record = self.create(new)?;
        self.process(&record.id.to_string()).await
    }

    /// Reset a `failed` request to `pending` and process it again
    pub async fn retry(&self, id: &str) -> Result<LlmRequestRecord, EngineError> {
        let mut record: LlmRequestRecord = self.store.load(&parse_id("request", id)?.to_string())?;
        let key = record.key();
        record
            .result
            .reset_for_retry(LlmRequestRecord::COLLECTION, &key)?;
        self.store.save(&record)?;
        info!(request_id = %record.id, "Retrying request");
        self.process(&key).await
    }

    pub fn show(&self, id: &str) -> Result<LlmRequestRecord, EngineError> {
        Ok(self.store.load(&parse_id("request", id)?.to_string())?)
    }

    /// All requests, newest first
    pub fn list(&self) -> Result<Vec<LlmRequestRecord>, EngineError> {
        let mut records: Vec<LlmRequestRecord> = self.store.list()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn create_conversation(
        &self,
        title: &str,
        provider: Option<String>,
        model: Option<String>,
    ) -> Result<Conversation, EngineError> {
        let mut conversation = Conversation::new(title);
        conversation.provider = provider;
        conversation.model = model;
        self.store.save(&conversation)?;
        info!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    pub fn conversation(&self, id: &str) -> Result<Conversation, EngineError> {
        Ok(self
            .store
            .load(&parse_id("conversation", id)?.to_string())?)
    }

    /// All conversations, most recently updated first
    pub fn conversations(&self) -> Result<Vec<Conversation>, EngineError> {
        let mut conversations: Vec<Conversation> = self.store.list()?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }
}
