use clap::Parser;
use tracing::debug;

use super::args::Cli;
use super::commands::{self, output::Output};
use crate::app::App;
use flowsmith_artifacts::ArtifactError;
use flowsmith_config::{CliArgs, Config, Credentials};
use flowsmith_deploy::DeployError;
use flowsmith_engine::EngineError;
use flowsmith_llm::LlmError;
use flowsmith_store::StoreError;
use flowsmith_utils::logging::init_tracing;
use flowsmith_utils::redaction::redact_secrets;
use flowsmith_utils::{ConfigError, ExitCode, UserFriendlyError, display_for_user};

/// Build the CLI command structure without parsing arguments
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}

/// Main CLI execution function.
///
/// All output, errors included, is printed here. `main` only turns the
/// returned code into the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_format) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        store_root: cli.store.clone(),
        artifacts_root: cli.artifacts_root.clone(),
        provider: cli.default_provider.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report(&err, ExitCode::CLI_ARGS)),
    };
    debug!(store = %config.store.root, artifacts = %config.artifacts.root, "Configuration loaded");

    let credentials = Credentials::from_env(&config);
    let app = match App::new(config, credentials) {
        Ok(app) => app,
        Err(err) => return Err(report(&err, ExitCode::CLI_ARGS)),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let out = Output::new(cli.json);
    match rt.block_on(commands::execute(cli.command, &app, out)) {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(err) => Err(report(&err, ExitCode::INTERNAL)),
    }
}

/// Print `err` for the user and pick its exit code.
///
/// Errors from the crates' own taxonomies carry their kind; anything else
/// exits with `fallback`.
fn report(err: &anyhow::Error, fallback: ExitCode) -> ExitCode {
    match classify(err) {
        Some(friendly) => {
            eprint!("{}", display_for_user(friendly));
            ExitCode::from(friendly.kind())
        }
        None => {
            eprintln!("Error: {}", redact_secrets(&format!("{err:#}")));
            fallback
        }
    }
}

fn classify(err: &anyhow::Error) -> Option<&dyn UserFriendlyError> {
    if let Some(e) = err.downcast_ref::<EngineError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<DeployError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<ArtifactError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<LlmError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<StoreError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return Some(e);
    }
    None
}
