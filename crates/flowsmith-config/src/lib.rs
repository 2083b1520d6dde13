//! Configuration management for flowsmith
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. The file is TOML with `[llm]`,
//! `[artifacts]`, `[store]`, `[deploy]` and `[improvement]` sections.

mod builder;
mod credentials;
mod discovery;
mod model;
mod validation;

pub use builder::ConfigBuilder;
pub use credentials::{Credentials, EnvLookup};
pub use discovery::{CONFIG_DIR, CONFIG_FILE, CliArgs};
pub use model::*;
