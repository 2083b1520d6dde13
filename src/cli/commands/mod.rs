//! One handler per subcommand group.
//!
//! Handlers return the exit code for a run that reached a result; an `Err`
//! means the operation itself could not be carried out.

mod artifacts;
mod deploy;
mod improve;
pub mod output;
mod requests;

use anyhow::Result;

use crate::app::App;
use crate::cli::args::Command;
use flowsmith_utils::ExitCode;
use output::Output;

pub async fn execute(command: Command, app: &App, out: Output) -> Result<ExitCode> {
    match command {
        Command::Ask {
            prompt,
            provider,
            model,
            system,
            conversation,
            temperature,
            max_tokens,
        } => {
            let new = requests::new_request(
                prompt,
                provider,
                model,
                system,
                conversation,
                temperature,
                max_tokens,
            )?;
            requests::ask(app, new, out).await
        }
        Command::Request(cmd) => requests::request(app, cmd, out).await,
        Command::Conversation(cmd) => requests::conversation(app, cmd, out),
        Command::Models { provider } => requests::models(app, provider.as_deref(), out),
        Command::Artifacts(cmd) => artifacts::execute(app, cmd, out),
        Command::Improve(cmd) => improve::execute(app, cmd, out).await,
        Command::Deploy(cmd) => deploy::deploy(app, cmd, out).await,
        Command::Connection(cmd) => deploy::connection(app, cmd, out).await,
    }
}

/// Exit code for a run that ended in a persisted `failed` record
const fn exit_for(failed: bool) -> ExitCode {
    if failed {
        ExitCode::RECORD_FAILED
    } else {
        ExitCode::SUCCESS
    }
}
