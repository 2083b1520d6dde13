//! Command-line interface for flowsmith

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Command};
pub use run::{build_cli, run};
