use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::ProviderKind;
use crate::transport::{VendorCall, VendorReply};
use crate::types::{ChatRequest, Completion, Role};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the request does not bound the output; the messages API requires a value
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Build a messages-API call.
///
/// Anthropic takes the system prompt as a top-level field, so system-role
/// entries are dropped from the message list.
pub(crate) fn build_call(
    base_url: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Result<VendorCall, LlmError> {
    let body = AnthropicRequest {
        model: &request.model,
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        system: request.system.as_deref().filter(|s| !s.is_empty()),
    };

    let body = serde_json::to_value(&body).map_err(|e| {
        LlmError::Misconfiguration(format!("Failed to encode Anthropic request: {e}"))
    })?;

    Ok(VendorCall {
        provider: ProviderKind::Anthropic,
        url: format!("{}/messages", base_url.trim_end_matches('/')),
        headers: vec![
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ],
        body,
    })
}

pub(crate) fn parse_response(reply: &VendorReply, model: &str) -> Result<Completion, LlmError> {
    let parsed: AnthropicResponse =
        serde_json::from_str(&reply.body).map_err(|e| LlmError::VendorCallFailed {
            provider: "anthropic".to_string(),
            status: Some(reply.status),
            message: format!("Failed to parse Anthropic response: {e}"),
        })?;

    // Concatenate all text segments
    let text: String = parsed
        .content
        .iter()
        .filter(|block| block.content_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() && parsed.content.is_empty() {
        return Err(LlmError::VendorCallFailed {
            provider: "anthropic".to_string(),
            status: Some(reply.status),
            message: "Anthropic response missing text content".to_string(),
        });
    }

    Ok(Completion {
        text,
        tokens_used: parsed.usage.map(|u| u.input_tokens + u.output_tokens),
        model: parsed.model.unwrap_or_else(|| model.to_string()),
    })
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn request(max_tokens: Option<u32>) -> ChatRequest {
        ChatRequest {
            model: "claude-3-haiku-20240307".to_string(),
            messages: vec![
                Message::system("sys"),
                Message::user("q1"),
                Message::system("late system note"),
                Message::assistant("a1"),
                Message::user("q2"),
            ],
            system: Some("sys".to_string()),
            max_tokens,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_system_goes_to_separate_field() {
        let call = build_call(DEFAULT_BASE_URL, "sk-ant-test", &request(None)).unwrap();
        assert_eq!(call.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(call.body["system"], "sys");
        let messages = call.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m["role"] != "system"));
        assert_eq!(messages[2]["content"], "q2");
    }

    #[test]
    fn test_max_tokens_default() {
        let call = build_call(DEFAULT_BASE_URL, "k", &request(None)).unwrap();
        assert_eq!(call.body["max_tokens"], 1000);
        let call = build_call(DEFAULT_BASE_URL, "k", &request(Some(64))).unwrap();
        assert_eq!(call.body["max_tokens"], 64);
    }

    #[test]
    fn test_headers() {
        let call = build_call(DEFAULT_BASE_URL, "sk-ant-test", &request(None)).unwrap();
        assert!(call
            .headers
            .contains(&("x-api-key".to_string(), "sk-ant-test".to_string())));
        assert!(call
            .headers
            .contains(&("anthropic-version".to_string(), "2023-06-01".to_string())));
    }

    #[test]
    fn test_tokens_are_input_plus_output() {
        let body = r#"{"content":[{"type":"text","text":"hel"},{"type":"text","text":"lo"}],"usage":{"input_tokens":10,"output_tokens":4}}"#;
        let completion =
            parse_response(&VendorReply::new(200, body), "claude-3-haiku-20240307").unwrap();
        assert_eq!(completion.text, "hello");
        assert_eq!(completion.tokens_used, Some(14));
    }

    #[test]
    fn test_no_content_blocks_fail() {
        let body = r#"{"content":[]}"#;
        assert!(parse_response(&VendorReply::new(200, body), "m").is_err());
    }
}
