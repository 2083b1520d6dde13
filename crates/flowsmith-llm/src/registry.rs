use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use flowsmith_config::{Config, Credentials, LlmConfig};
use flowsmith_utils::redaction::redact_secrets;
use strum::IntoEnumIterator;

use crate::adapter::ProviderAdapter;
use crate::error::LlmError;
use crate::http_client::HttpClient;
use crate::provider::ProviderKind;
use crate::transport::Transport;
use crate::types::{ChatRequest, ProviderOutcome};

/// Maps provider names to adapters and performs dispatch.
///
/// Adapter settings are validated when the registry is built. Credentials are
/// checked on each dispatch, before the transport is touched.
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, ProviderAdapter>,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
    default_provider: ProviderKind,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.adapters.keys().collect::<Vec<_>>())
            .field("credentials", &self.credentials)
            .field("request_timeout", &self.request_timeout)
            .field("default_provider", &self.default_provider)
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    /// Build a registry over an explicit transport
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if any provider's settings are
    /// invalid, or `LlmError::UnsupportedProvider` if the configured default
    /// provider is unknown.
    pub fn new(
        config: &LlmConfig,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, LlmError> {
        let mut adapters = HashMap::new();
        for kind in ProviderKind::iter() {
            let settings = config.provider(kind.as_ref()).ok_or_else(|| {
                LlmError::Misconfiguration(format!("missing settings for provider {kind}"))
            })?;
            adapters.insert(kind, ProviderAdapter::from_settings(kind, settings)?);
        }

        let default_provider = ProviderKind::from_name(&config.default_provider)
            .ok_or_else(|| LlmError::UnsupportedProvider(config.default_provider.clone()))?;

        Ok(Self {
            adapters,
            credentials,
            transport,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            default_provider,
        })
    }

    /// Build a registry that talks to the real vendor endpoints
    ///
    /// # Errors
    ///
    /// See [`ProviderRegistry::new`]; also fails if the HTTP client cannot be built.
    pub fn from_config(config: &Config, credentials: Credentials) -> Result<Self, LlmError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpClient::new()?);
        Self::new(&config.llm, credentials, transport)
    }

    #[must_use]
    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Resolve a provider name to its adapter
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnsupportedProvider` for names outside the closed set.
    pub fn adapter(&self, provider_name: &str) -> Result<&ProviderAdapter, LlmError> {
        ProviderKind::from_name(provider_name)
            .and_then(|kind| self.adapters.get(&kind))
            .ok_or_else(|| LlmError::UnsupportedProvider(provider_name.to_string()))
    }

    /// Model a request against `provider_name` would run with
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnsupportedProvider` for unknown names.
    pub fn effective_model(
        &self,
        provider_name: &str,
        request: &ChatRequest,
    ) -> Result<String, LlmError> {
        Ok(self
            .adapter(provider_name)?
            .effective_model(request)
            .to_string())
    }

    fn api_key(&self, adapter: &ProviderAdapter) -> Result<&str, LlmError> {
        let kind = adapter.kind();
        let value = self.credentials.provider_key(kind.as_ref());
        if !kind.is_usable_key(value) {
            return Err(LlmError::CredentialMissing {
                provider: kind.to_string(),
                env_var: adapter.api_key_env().to_string(),
            });
        }
        Ok(value.map(str::trim).unwrap_or_default())
    }

    /// Send one request to one provider.
    ///
    /// Exactly one transport call is made once the credential check passes.
    /// Vendor-side failures come back as [`ProviderOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnsupportedProvider` or `LlmError::CredentialMissing`;
    /// both are raised before any network activity.
    pub async fn dispatch(
        &self,
        provider_name: &str,
        request: &ChatRequest,
    ) -> Result<ProviderOutcome, LlmError> {
        let adapter = self.adapter(provider_name)?;
        let api_key = self.api_key(adapter)?;
        let model = adapter.effective_model(request).to_string();

        debug!(
            provider = %adapter.kind(),
            model = %model,
            messages = request.messages.len(),
            max_tokens = ?request.max_tokens,
            temperature = request.temperature,
            timeout_secs = self.request_timeout.as_secs(),
            "Dispatching LLM request"
        );

        let started = Instant::now();
        let result = match adapter.build_call(api_key, request) {
            Ok(call) => match self.transport.send(&call, self.request_timeout).await {
                Ok(reply) => adapter.parse_reply(&reply, &model),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(completion) => {
                info!(
                    provider = %adapter.kind(),
                    model = %completion.model,
                    tokens = ?completion.tokens_used,
                    elapsed_ms,
                    "LLM request completed"
                );
                Ok(ProviderOutcome::Completed {
                    completion,
                    elapsed_ms,
                })
            }
            Err(e) => {
                let error = redact_secrets(&e.to_string());
                warn!(provider = %adapter.kind(), model = %model, elapsed_ms, error = %error, "LLM request failed");
                Ok(ProviderOutcome::Failed { error, elapsed_ms })
            }
        }
    }
}
