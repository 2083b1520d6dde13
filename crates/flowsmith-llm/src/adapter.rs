use serde::Deserialize;

use flowsmith_config::ProviderSettings;

use crate::error::LlmError;
use crate::provider::ProviderKind;
use crate::transport::{VendorCall, VendorReply};
use crate::types::{ChatRequest, Completion};
use crate::{anthropic, catalog, gemini, openai};

/// One configured vendor adapter.
///
/// Adapters hold no credentials and perform no I/O; the registry supplies the
/// key and the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAdapter {
    kind: ProviderKind,
    base_url: String,
    default_model: String,
    api_key_env: String,
}

impl ProviderAdapter {
    /// Build an adapter from its `[llm.<provider>]` settings
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the base URL is not http(s) or
    /// the key variable name is empty.
    pub fn from_settings(kind: ProviderKind, settings: &ProviderSettings) -> Result<Self, LlmError> {
        if settings.api_key_env.trim().is_empty() {
            return Err(LlmError::Misconfiguration(format!(
                "{kind}: api_key_env must not be empty"
            )));
        }

        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(kind).to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::Misconfiguration(format!(
                "{kind}: base_url must start with http:// or https://, got '{base_url}'"
            )));
        }

        let default_model = settings
            .default_model
            .clone()
            .unwrap_or_else(|| catalog::default_model(kind).to_string());

        Ok(Self {
            kind,
            base_url,
            default_model,
            api_key_env: settings.api_key_env.clone(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Name of the environment variable the key is read from
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    /// Model the request will actually run against
    #[must_use]
    pub fn effective_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.trim().is_empty() {
            &self.default_model
        } else {
            &request.model
        }
    }

    /// Turn a normalized request into a vendor call
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the body cannot be encoded.
    pub fn build_call(&self, api_key: &str, request: &ChatRequest) -> Result<VendorCall, LlmError> {
        let mut request = request.clone();
        request.model = self.effective_model(&request).to_string();
        match self.kind {
            ProviderKind::OpenAi => openai::build_call(&self.base_url, api_key, &request),
            ProviderKind::Anthropic => anthropic::build_call(&self.base_url, api_key, &request),
            ProviderKind::Gemini => gemini::build_call(&self.base_url, api_key, &request),
        }
    }

    /// Turn a vendor reply into a completion
    ///
    /// # Errors
    ///
    /// Returns `LlmError::VendorCallFailed` for non-2xx replies (carrying the
    /// vendor's `error.message` when present) and for malformed bodies.
    pub fn parse_reply(&self, reply: &VendorReply, model: &str) -> Result<Completion, LlmError> {
        if !reply.is_success() {
            return Err(LlmError::VendorCallFailed {
                provider: self.kind.to_string(),
                status: Some(reply.status),
                message: vendor_error_message(reply),
            });
        }
        match self.kind {
            ProviderKind::OpenAi => openai::parse_response(reply, model),
            ProviderKind::Anthropic => anthropic::parse_response(reply, model),
            ProviderKind::Gemini => gemini::parse_response(reply, model),
        }
    }
}

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => openai::DEFAULT_BASE_URL,
        ProviderKind::Anthropic => anthropic::DEFAULT_BASE_URL,
        ProviderKind::Gemini => gemini::DEFAULT_BASE_URL,
    }
}

/// All three vendors wrap failures as `{"error": {"message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn vendor_error_message(reply: &VendorReply) -> String {
    match serde_json::from_str::<ErrorEnvelope>(&reply.body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if reply.body.trim().is_empty() => format!("HTTP {}", reply.status),
        Err(_) => {
            let body: String = reply.body.chars().take(500).collect();
            format!("HTTP {}: {}", reply.status, body.trim())
        }
    }
}
