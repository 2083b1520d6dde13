use anyhow::Result;

use super::exit_for;
use super::output::{self, Output};
use crate::app::App;
use crate::cli::args::ImproveCommand;
use flowsmith_engine::ImproveRequest;
use flowsmith_store::{AnalysisRecord, RequestStatus};
use flowsmith_utils::ExitCode;

pub async fn execute(app: &App, cmd: ImproveCommand, out: Output) -> Result<ExitCode> {
    match cmd {
        ImproveCommand::Run {
            query,
            provider,
            model,
            instructions,
            system_prompt,
            no_deploy,
        } => {
            let request = ImproveRequest {
                query: query.to_query(),
                provider,
                model,
                instructions,
                system_prompt,
            };
            let analysis = app.improvement(!no_deploy).improve(&request).await?;
            finished(&analysis, out)
        }
        ImproveCommand::Show { id } => {
            let analysis = app.improvement(false).show(&id)?;
            out.emit(&analysis, || output::analysis(&analysis))?;
            Ok(ExitCode::SUCCESS)
        }
        ImproveCommand::List => {
            let analyses = app.improvement(false).list()?;
            out.emit(&analyses, || {
                output::rows(&analyses, output::analysis_row, "No analyses yet")
            })?;
            Ok(ExitCode::SUCCESS)
        }
        ImproveCommand::Retry { id, no_deploy } => {
            let analysis = app.improvement(!no_deploy).retry(&id).await?;
            finished(&analysis, out)
        }
    }
}

/// A failed deployment leaves the analysis completed, so only the LLM
/// outcome decides the exit code.
fn finished(analysis: &AnalysisRecord, out: Output) -> Result<ExitCode> {
    out.emit(analysis, || output::analysis(analysis))?;
    Ok(exit_for(analysis.status() == RequestStatus::Failed))
}
