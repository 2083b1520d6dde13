use anyhow::{Context, Result, anyhow};
use std::path::Path;

use super::exit_for;
use super::output::{self, Output};
use crate::app::App;
use crate::cli::args::{ConnectionCommand, DeployCommand};
use flowsmith_deploy::DeployError;
use flowsmith_store::DeploymentRecord;
use flowsmith_utils::{ExitCode, display_for_user};

pub async fn deploy(app: &App, cmd: DeployCommand, out: Output) -> Result<ExitCode> {
    let deployer = app.deployer();
    match cmd {
        DeployCommand::File {
            path,
            workflow_id,
            name,
        } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = match name {
                Some(name) => name,
                None => file_name_of(&path)?,
            };
            let outcome = deployer
                .deploy(&content, &file_name, workflow_id.as_deref())
                .await;
            attempted(outcome, out)
        }
        DeployCommand::Show { id } => {
            let record = deployer.show(&id)?;
            out.emit(&record, || output::deployment(&record))?;
            Ok(ExitCode::SUCCESS)
        }
        DeployCommand::List => {
            let records = deployer.list()?;
            out.emit(&records, || {
                output::rows(&records, output::deployment_row, "No deployments yet")
            })?;
            Ok(ExitCode::SUCCESS)
        }
        DeployCommand::Retry { id } => {
            let outcome = deployer.retry_deployment(&id).await;
            attempted(outcome, out)
        }
    }
}

pub async fn connection(app: &App, cmd: ConnectionCommand, out: Output) -> Result<ExitCode> {
    let deployer = app.deployer();
    match cmd {
        ConnectionCommand::Setup => {
            let (connection, created) = deployer.setup_default_connection()?;
            out.emit(&connection, || {
                let verb = if created { "Created" } else { "Using existing" };
                format!(
                    "{verb} connection '{}' ({}:{}, base {})",
                    connection.name,
                    connection.destination(),
                    connection.port,
                    connection.remote_base_path
                )
            })?;
            Ok(ExitCode::SUCCESS)
        }
        ConnectionCommand::Test { name } => {
            let report = deployer.test_connection(name.as_deref()).await?;
            out.emit(&report, || {
                let mark = if report.success { "✓" } else { "✗" };
                format!("{mark} {} ({}): {}", report.connection, report.destination, report.message)
            })?;
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::INTERNAL
            })
        }
        ConnectionCommand::Exec { name, command } => {
            let result = deployer
                .execute_command(name.as_deref(), &command.join(" "))
                .await?;
            out.emit(&result, || output::command_result(&result))?;
            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::INTERNAL
            })
        }
    }
}

/// A deployment that reached the point of persisting a failed record is
/// reported with that record; earlier failures propagate.
fn attempted(outcome: Result<DeploymentRecord, DeployError>, out: Output) -> Result<ExitCode> {
    let err = match outcome {
        Ok(record) => {
            out.emit(&record, || output::deployment(&record))?;
            return Ok(exit_for(false));
        }
        Err(err) => err,
    };
    if let Some(record) = err.record() {
        out.emit(record, || output::deployment(record))?;
        eprintln!("{}", display_for_user(&err));
        return Ok(exit_for(true));
    }
    Err(err.into())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a file name from {}", path.display()))
}
