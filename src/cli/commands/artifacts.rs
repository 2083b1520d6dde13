use anyhow::Result;

use super::output::{self, Output};
use crate::app::App;
use crate::cli::args::ArtifactsCommand;
use flowsmith_utils::ExitCode;

pub fn execute(app: &App, cmd: ArtifactsCommand, out: Output) -> Result<ExitCode> {
    let resolver = app.resolver();
    match cmd {
        ArtifactsCommand::List => {
            let entries = resolver.list()?;
            out.emit(&entries, || {
                output::rows(
                    &entries,
                    output::artifact_row,
                    &format!("No generated files under {}", resolver.root()),
                )
            })?;
        }
        ArtifactsCommand::Latest => {
            let latest = resolver.latest()?;
            out.emit(&latest, || match &latest {
                Some(entry) => output::artifact_row(entry),
                None => "No generated files yet".to_string(),
            })?;
        }
        ArtifactsCommand::Resolve(query) => {
            let resolved = resolver.resolve(&query.to_query())?;
            let path = resolved.path.to_string();
            out.emit(&path, || path.clone())?;
        }
        ArtifactsCommand::Show(query) => {
            let details = resolver.details(&query.to_query())?;
            out.emit(&details, || {
                format!(
                    "{} ({} bytes, modified {})\n\n{}",
                    details.path,
                    details.size,
                    details.modified_at.format("%Y-%m-%d %H:%M:%S"),
                    details.content
                )
            })?;
        }
        ArtifactsCommand::Status { workflow_id } => {
            let report = resolver.status(&workflow_id)?;
            out.emit(&report, || {
                let mut text = format!(
                    "Workflow {}: {}\nFile exists: {}\nReady for analysis: {}",
                    report.workflow_id, report.status, report.file_exists, report.ready_for_analysis
                );
                if let Some(error) = &report.error_message {
                    text.push_str(&format!("\nError: {error}"));
                }
                text
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
