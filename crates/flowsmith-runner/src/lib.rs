//! Process execution for remote-shell tooling
//!
//! # Security Model
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style invocation.
//! Arguments are passed as discrete elements rather than shell strings, and
//! secrets travel through the environment, never through argv.

pub mod command_spec;
pub mod error;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};
