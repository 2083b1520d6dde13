//! Known models per provider

use serde::Serialize;

use crate::provider::ProviderKind;

/// A catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub provider: ProviderKind,
    pub name: &'static str,
    pub display_name: &'static str,
    pub max_tokens: u32,
}

const fn model(
    provider: ProviderKind,
    name: &'static str,
    display_name: &'static str,
    max_tokens: u32,
) -> ModelInfo {
    ModelInfo {
        provider,
        name,
        display_name,
        max_tokens,
    }
}

/// Ordered so the first entry per provider is its default
static MODELS: &[ModelInfo] = &[
    model(ProviderKind::OpenAi, "gpt-4o", "GPT-4o", 4096),
    model(ProviderKind::OpenAi, "gpt-4o-mini", "GPT-4o Mini", 16384),
    model(ProviderKind::OpenAi, "gpt-3.5-turbo", "GPT-3.5 Turbo", 4096),
    model(
        ProviderKind::Anthropic,
        "claude-3-5-sonnet-20241022",
        "Claude 3.5 Sonnet",
        8192,
    ),
    model(
        ProviderKind::Anthropic,
        "claude-3-haiku-20240307",
        "Claude 3 Haiku",
        4096,
    ),
    model(ProviderKind::Gemini, "gemini-2.5-flash", "Gemini 2.5 Flash", 8192),
    model(ProviderKind::Gemini, "gemini-1.5-pro", "Gemini 1.5 Pro", 32768),
];

/// Every known model, optionally restricted to one provider
#[must_use]
pub fn models_for(provider: Option<ProviderKind>) -> Vec<ModelInfo> {
    MODELS
        .iter()
        .filter(|m| provider.is_none_or(|p| m.provider == p))
        .copied()
        .collect()
}

/// Built-in default model for a provider
#[must_use]
pub fn default_model(provider: ProviderKind) -> &'static str {
    MODELS
        .iter()
        .find(|m| m.provider == provider)
        .map_or("", |m| m.name)
}

/// Look up a model by provider and name
#[must_use]
pub fn find(provider: ProviderKind, name: &str) -> Option<ModelInfo> {
    MODELS
        .iter()
        .find(|m| m.provider == provider && m.name == name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_provider_has_a_default() {
        for kind in ProviderKind::iter() {
            assert!(!default_model(kind).is_empty(), "{kind} has no models");
        }
        assert_eq!(default_model(ProviderKind::Anthropic), "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_filter_by_provider() {
        let gemini = models_for(Some(ProviderKind::Gemini));
        assert_eq!(gemini.len(), 2);
        assert!(gemini.iter().all(|m| m.provider == ProviderKind::Gemini));
        assert_eq!(models_for(None).len(), 7);
    }

    #[test]
    fn test_find() {
        assert_eq!(
            find(ProviderKind::OpenAi, "gpt-4o-mini").map(|m| m.max_tokens),
            Some(16384)
        );
        assert!(find(ProviderKind::OpenAi, "gemini-1.5-pro").is_none());
    }
}
