//! flowsmith: LLM-assisted improvement and deployment of generated workflows
//!
//! The library wires the workspace crates together behind [`App`] and hosts
//! the command-line interface in [`cli`].

mod app;
pub mod cli;

pub use app::App;

pub use flowsmith_config::{CliArgs, Config, Credentials};
pub use flowsmith_utils::{ExitCode, UserFriendlyError};
