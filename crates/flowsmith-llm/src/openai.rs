use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::ProviderKind;
use crate::transport::{VendorCall, VendorReply};
use crate::types::{ChatRequest, Completion};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Build a chat-completions call.
///
/// The message list already carries the system message first, which is the
/// form OpenAI expects.
pub(crate) fn build_call(
    base_url: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Result<VendorCall, LlmError> {
    let body = OpenAiRequest {
        model: &request.model,
        messages: request
            .messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    };

    let body = serde_json::to_value(&body)
        .map_err(|e| LlmError::Misconfiguration(format!("Failed to encode OpenAI request: {e}")))?;

    Ok(VendorCall {
        provider: ProviderKind::OpenAi,
        url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        headers: vec![("Authorization".to_string(), format!("Bearer {api_key}"))],
        body,
    })
}

pub(crate) fn parse_response(reply: &VendorReply, model: &str) -> Result<Completion, LlmError> {
    let parsed: OpenAiResponse =
        serde_json::from_str(&reply.body).map_err(|e| LlmError::VendorCallFailed {
            provider: "openai".to_string(),
            status: Some(reply.status),
            message: format!("Failed to parse OpenAI response: {e}"),
        })?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::VendorCallFailed {
            provider: "openai".to_string(),
            status: Some(reply.status),
            message: "OpenAI response contained no choices".to_string(),
        })?;

    Ok(Completion {
        text,
        tokens_used: parsed.usage.map(|u| u.total_tokens),
        model: parsed.model.unwrap_or_else(|| model.to_string()),
    })
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: String,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}
