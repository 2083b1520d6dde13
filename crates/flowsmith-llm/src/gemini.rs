use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::ProviderKind;
use crate::transport::{VendorCall, VendorReply};
use crate::types::{ChatRequest, Completion, Role};

pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Flatten the ordered context into a single text prompt.
///
/// Layout: `System: <sys>\n\n`, one `<Role>: <content>\n` per history entry,
/// then `User: <prompt>`, all joined with `\n`.
pub(crate) fn flatten_prompt(request: &ChatRequest) -> String {
    let mut parts = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("System: {system}\n\n"));
    }

    let mut messages = request.messages.as_slice();
    // The leading system message is already rendered above
    if request.system.is_some()
        && let Some((first, rest)) = messages.split_first()
        && first.role == Role::System
    {
        messages = rest;
    }

    if let Some((prompt, history)) = messages.split_last() {
        for message in history {
            parts.push(format!("{}: {}\n", message.role.label(), message.content));
        }
        parts.push(format!("User: {}", prompt.content));
    }

    parts.join("\n")
}

pub(crate) fn build_call(
    base_url: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Result<VendorCall, LlmError> {
    let text = flatten_prompt(request);
    let body = GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: &text }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    };

    let body = serde_json::to_value(&body)
        .map_err(|e| LlmError::Misconfiguration(format!("Failed to encode Gemini request: {e}")))?;

    Ok(VendorCall {
        provider: ProviderKind::Gemini,
        url: format!(
            "{}/models/{}:generateContent?key={}",
            base_url.trim_end_matches('/'),
            request.model,
            api_key
        ),
        headers: Vec::new(),
        body,
    })
}

pub(crate) fn parse_response(reply: &VendorReply, model: &str) -> Result<Completion, LlmError> {
    let parsed: GeminiResponse =
        serde_json::from_str(&reply.body).map_err(|e| LlmError::VendorCallFailed {
            provider: "gemini".to_string(),
            status: Some(reply.status),
            message: format!("Failed to parse Gemini response: {e}"),
        })?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::VendorCallFailed {
            provider: "gemini".to_string(),
            status: Some(reply.status),
            message: "Gemini response contained no candidates".to_string(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok(Completion {
        text,
        tokens_used: parsed.usage_metadata.and_then(|u| u.total_token_count),
        model: parsed.model_version.unwrap_or_else(|| model.to_string()),
    })
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u64>,
}
