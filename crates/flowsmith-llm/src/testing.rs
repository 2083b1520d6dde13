//! Test doubles for [`Transport`]

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::LlmError;
use crate::transport::{Transport, VendorCall, VendorReply};

#[derive(Debug, Clone)]
enum Canned {
    Reply(VendorReply),
    Error(String),
}

/// Transport that answers every call with a canned reply and counts calls
#[derive(Debug)]
pub struct MockTransport {
    canned: Canned,
    calls: AtomicU32,
    last_call: Mutex<Option<VendorCall>>,
}

impl MockTransport {
    /// Answer with an arbitrary status and body
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::with(Canned::Reply(VendorReply::new(status, body)))
    }

    /// Answer with an OpenAI-shaped completion carrying `text` (3 tokens)
    #[must_use]
    pub fn openai_text(text: &str) -> Self {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 2, "completion_tokens": 1, "total_tokens": 3}
        });
        Self::status(200, body.to_string())
    }

    /// Answer with an Anthropic-shaped completion carrying `text`
    #[must_use]
    pub fn anthropic_text(text: &str) -> Self {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 2, "output_tokens": 1}
        });
        Self::status(200, body.to_string())
    }

    /// Answer with a Gemini-shaped completion carrying `text`
    #[must_use]
    pub fn gemini_text(text: &str) -> Self {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        });
        Self::status(200, body.to_string())
    }

    /// Fail every call at the transport level
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with(Canned::Error(message.into()))
    }

    fn with(canned: Canned) -> Self {
        Self {
            canned,
            calls: AtomicU32::new(0),
            last_call: Mutex::new(None),
        }
    }

    /// Number of calls that reached the transport
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent call, if any
    #[must_use]
    pub fn last_call(&self) -> Option<VendorCall> {
        self.last_call.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, call: &VendorCall, _timeout: Duration) -> Result<VendorReply, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_call.lock() {
            *guard = Some(call.clone());
        }
        match &self.canned {
            Canned::Reply(reply) => Ok(reply.clone()),
            Canned::Error(message) => Err(LlmError::VendorCallFailed {
                provider: call.provider.to_string(),
                status: None,
                message: message.clone(),
            }),
        }
    }
}
