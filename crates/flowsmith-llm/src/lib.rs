//! LLM provider dispatch for flowsmith
//!
//! A closed set of providers ([`ProviderKind`]) each map to one
//! [`ProviderAdapter`]. Adapters are pure: they turn a normalized
//! [`ChatRequest`] into a [`VendorCall`] and a vendor JSON reply into a
//! [`Completion`]. The [`Transport`] performs the network round trip, which
//! keeps adapters testable without a network and lets tests count calls.

pub mod adapter;
mod anthropic;
pub mod catalog;
pub mod error;
mod gemini;
pub mod http_client;
mod openai;
pub mod provider;
pub mod registry;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapter::ProviderAdapter;
pub use catalog::{ModelInfo, default_model, models_for};
pub use error::LlmError;
pub use http_client::HttpClient;
pub use provider::ProviderKind;
pub use registry::ProviderRegistry;
pub use transport::{Transport, VendorCall};
pub use types::{ChatRequest, Completion, Message, ProviderOutcome, Role};
