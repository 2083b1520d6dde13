use async_trait::async_trait;
use std::time::Duration;

use crate::error::LlmError;
use crate::provider::ProviderKind;

/// A fully-built vendor HTTP call
///
/// Adapters produce this; a [`Transport`] sends it. Header values may carry
/// secrets, so `Debug` output of this type must not reach logs.
#[derive(Clone, PartialEq)]
pub struct VendorCall {
    pub provider: ProviderKind,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl std::fmt::Debug for VendorCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("VendorCall")
            .field("provider", &self.provider)
            .field("url", &flowsmith_utils::redaction::redact_secrets(&self.url))
            .field("headers", &header_names)
            .finish_non_exhaustive()
    }
}

/// Raw vendor answer: HTTP status and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorReply {
    pub status: u16,
    pub body: String,
}

impl VendorReply {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends vendor calls over the network (or pretends to, in tests).
///
/// Implementations must not retry on their own: a single call either yields
/// a reply (of any HTTP status) or a transport-level error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &VendorCall, timeout: Duration) -> Result<VendorReply, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_header_values_and_key_query() {
        let call = VendorCall {
            provider: ProviderKind::Gemini,
            url: "https://example.test/v1beta/models/m:generateContent?key=AIzaSECRETSECRETSECRET"
                .to_string(),
            headers: vec![("x-api-key".to_string(), "sk-ant-secret".to_string())],
            body: serde_json::json!({}),
        };
        let shown = format!("{call:?}");
        assert!(shown.contains("x-api-key"));
        assert!(!shown.contains("sk-ant-secret"));
        assert!(!shown.contains("AIzaSECRETSECRETSECRET"));
    }

    #[test]
    fn test_reply_success_range() {
        assert!(VendorReply::new(200, "").is_success());
        assert!(!VendorReply::new(404, "").is_success());
        assert!(!VendorReply::new(500, "").is_success());
    }
}
