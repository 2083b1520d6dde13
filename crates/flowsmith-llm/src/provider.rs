use serde::{Deserialize, Serialize};

/// Closed set of supported LLM vendors
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    #[strum(serialize = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Parse a provider name, case-insensitively
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        name.trim().to_ascii_lowercase().parse().ok()
    }

    /// Value shipped in sample `.env` files; treated as unset
    #[must_use]
    pub const fn placeholder_key(self) -> &'static str {
        match self {
            Self::OpenAi => "your-openai-api-key-here",
            Self::Anthropic => "your-anthropic-api-key-here",
            Self::Gemini => "your-gemini-api-key-here",
        }
    }

    /// Human-readable vendor name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        }
    }

    /// Whether a raw credential value counts as configured
    #[must_use]
    pub fn is_usable_key(self, value: Option<&str>) -> bool {
        match value.map(str::trim) {
            None | Some("") => false,
            Some(v) => v != self.placeholder_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_round_trip() {
        for kind in ProviderKind::iter() {
            assert_eq!(ProviderKind::from_name(kind.as_ref()), Some(kind));
        }
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::from_name(" Gemini "), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::from_name("mistral"), None);
    }

    #[test]
    fn test_placeholder_is_not_usable() {
        let kind = ProviderKind::Anthropic;
        assert!(!kind.is_usable_key(None));
        assert!(!kind.is_usable_key(Some("")));
        assert!(!kind.is_usable_key(Some("  ")));
        assert!(!kind.is_usable_key(Some("your-anthropic-api-key-here")));
        assert!(kind.is_usable_key(Some("sk-ant-real")));
        // Another provider's placeholder is just an (invalid) key, not "unset"
        assert!(kind.is_usable_key(Some("your-openai-api-key-here")));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::OpenAi).unwrap(),
            "\"openai\""
        );
    }
}
