use anyhow::{Context, Result, bail};
use std::io::{IsTerminal, Read};

use super::exit_for;
use super::output::{self, Output};
use crate::app::App;
use crate::cli::args::{ConversationCommand, RequestCommand};
use flowsmith_engine::NewRequest;
use flowsmith_llm::{LlmError, ProviderKind, models_for};
use flowsmith_store::RequestStatus;
use flowsmith_utils::ExitCode;

/// Build a request from `ask` arguments, reading the prompt from stdin when
/// it was not given inline.
pub fn new_request(
    prompt: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    system: Option<String>,
    conversation: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> Result<NewRequest> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None => read_stdin_prompt()?,
    };
    Ok(NewRequest {
        provider,
        model,
        prompt,
        system_message: system,
        conversation_id: conversation,
        temperature,
        max_tokens,
    })
}

fn read_stdin_prompt() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!(flowsmith_utils::ConfigError::InvalidValue {
            key: "prompt".to_string(),
            value: "missing; pass it as an argument or pipe it on stdin".to_string(),
        });
    }
    let mut prompt = String::new();
    stdin
        .read_to_string(&mut prompt)
        .context("Failed to read prompt from stdin")?;
    Ok(prompt)
}

pub async fn ask(app: &App, new: NewRequest, out: Output) -> Result<ExitCode> {
    let record = app.lifecycle().submit(new).await?;
    out.emit(&record, || output::request(&record))?;
    Ok(exit_for(record.status() == RequestStatus::Failed))
}

pub async fn request(app: &App, cmd: RequestCommand, out: Output) -> Result<ExitCode> {
    let lifecycle = app.lifecycle();
    match cmd {
        RequestCommand::Show { id } => {
            let record = lifecycle.show(&id)?;
            out.emit(&record, || output::request(&record))?;
        }
        RequestCommand::List => {
            let records = lifecycle.list()?;
            out.emit(&records, || {
                output::rows(&records, output::request_row, "No requests yet")
            })?;
        }
        RequestCommand::Retry { id } => {
            let record = lifecycle.retry(&id).await?;
            out.emit(&record, || output::request(&record))?;
            return Ok(exit_for(record.status() == RequestStatus::Failed));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn conversation(app: &App, cmd: ConversationCommand, out: Output) -> Result<ExitCode> {
    let lifecycle = app.lifecycle();
    match cmd {
        ConversationCommand::New {
            title,
            provider,
            model,
        } => {
            let conversation = lifecycle.create_conversation(&title, provider, model)?;
            out.emit(&conversation, || {
                format!("Created conversation {}", conversation.id)
            })?;
        }
        ConversationCommand::Show { id } => {
            let conversation = lifecycle.conversation(&id)?;
            out.emit(&conversation, || output::conversation(&conversation))?;
        }
        ConversationCommand::List => {
            let conversations = lifecycle.conversations()?;
            out.emit(&conversations, || {
                output::rows(&conversations, output::conversation_row, "No conversations yet")
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn models(app: &App, provider: Option<&str>, out: Output) -> Result<ExitCode> {
    let filter = provider
        .map(|name| {
            ProviderKind::from_name(name).ok_or_else(|| LlmError::UnsupportedProvider(name.to_string()))
        })
        .transpose()?;
    let models = models_for(filter);
    let default_provider = app.registry().default_provider();
    out.emit(&models, || {
        let table = output::rows(&models, output::model_row, "No models");
        format!("{table}\n\nDefault provider: {default_provider}")
    })?;
    Ok(ExitCode::SUCCESS)
}
