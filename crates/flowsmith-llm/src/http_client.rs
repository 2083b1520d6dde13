//! Shared HTTP transport for the vendor APIs
//!
//! One `reqwest::Client` is built per process and reused for every dispatch.
//! Calls are made exactly once: retrying is an explicit user action on the
//! stored request, never something the transport does behind its back.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use flowsmith_config::DEFAULT_CONNECT_TIMEOUT_SECS;
use flowsmith_utils::redaction::redact_secrets;

use crate::error::LlmError;
use crate::transport::{Transport, VendorCall, VendorReply};

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS);

/// reqwest-backed [`Transport`]
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, call: &VendorCall, timeout: Duration) -> Result<VendorReply, LlmError> {
        let provider = call.provider.to_string();
        debug!(
            provider = %provider,
            url = %redact_secrets(&call.url),
            timeout_secs = timeout.as_secs(),
            "Sending vendor request"
        );

        let mut builder = self.client.post(&call.url).timeout(timeout).json(&call.body);
        for (name, value) in &call.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    provider: provider.clone(),
                    duration: timeout,
                }
            } else {
                LlmError::VendorCallFailed {
                    provider: provider.clone(),
                    status: None,
                    message: redact_secrets(&e.to_string()),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| LlmError::VendorCallFailed {
            provider: provider.clone(),
            status: Some(status),
            message: format!("Failed to read response body: {}", redact_secrets(&e.to_string())),
        })?;

        debug!(provider = %provider, status, body_len = body.len(), "Vendor replied");
        Ok(VendorReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_construction() {
        assert!(HttpClient::new().is_ok(), "Should construct HTTP client");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_vendor_failure() {
        let client = HttpClient::new().unwrap();
        let call = VendorCall {
            provider: crate::ProviderKind::OpenAi,
            // Port 9 on loopback is discard; nothing listens there in CI
            url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer sk-test".to_string())],
            body: serde_json::json!({"model": "gpt-4o"}),
        };
        let err = client.send(&call, Duration::from_secs(5)).await.unwrap_err();
        match err {
            LlmError::VendorCallFailed { provider, status, .. } => {
                assert_eq!(provider, "openai");
                assert_eq!(status, None);
            }
            LlmError::Timeout { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
