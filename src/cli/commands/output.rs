//! Terminal rendering for command results
//!
//! Every result is `Serialize`; `--json` prints it as-is and the default
//! mode prints a short human summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use flowsmith_artifacts::ArtifactEntry;
use flowsmith_deploy::CommandResult;
use flowsmith_llm::ModelInfo;
use flowsmith_store::{AnalysisRecord, Conversation, DeploymentRecord, LlmRequestRecord};

/// Where command output goes
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    #[must_use]
    pub const fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `value` as JSON, or the text built by `human`
    pub fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            let text =
                serde_json::to_string_pretty(value).context("Failed to serialize output")?;
            println!("{text}");
        } else {
            let text = human();
            if !text.is_empty() {
                println!("{}", text.trim_end());
            }
        }
        Ok(())
    }
}

pub fn request(record: &LlmRequestRecord) -> String {
    let mut out = format!(
        "Request {} [{}] {}/{}\n",
        record.id,
        record.status(),
        record.provider,
        record.model
    );
    if let Some(conversation) = record.conversation_id {
        let _ = writeln!(out, "Conversation: {conversation}");
    }
    if let Some(response) = &record.result.response {
        let _ = writeln!(out, "\n{response}");
    }
    if let Some(error) = &record.result.error_message {
        let _ = writeln!(out, "Error: {error}");
    }
    if let Some(ms) = record.result.response_time_ms {
        let _ = writeln!(out, "Response time: {ms} ms");
    }
    out
}

pub fn request_row(record: &LlmRequestRecord) -> String {
    format!(
        "{}  {:<10} {:<9} {:<28} {}",
        record.id,
        record.status(),
        record.provider,
        record.model,
        preview(&record.prompt, 40)
    )
}

pub fn conversation(conversation: &Conversation) -> String {
    let mut out = format!("Conversation {} \"{}\"\n", conversation.id, conversation.title);
    for message in &conversation.messages {
        let _ = writeln!(out, "\n[{}] {}", message.role, message.content);
    }
    out
}

pub fn conversation_row(conversation: &Conversation) -> String {
    format!(
        "{}  {:>3} messages  {}  {}",
        conversation.id,
        conversation.messages.len(),
        conversation.updated_at.format("%Y-%m-%d %H:%M"),
        conversation.title
    )
}

pub fn model_row(model: &ModelInfo) -> String {
    format!(
        "{:<10} {:<28} {:<18} {:>6}",
        model.provider, model.name, model.display_name, model.max_tokens
    )
}

pub fn artifact_row(entry: &ArtifactEntry) -> String {
    format!(
        "{}  {:>8} B  {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.size,
        entry.path
    )
}

pub fn analysis(record: &AnalysisRecord) -> String {
    let mut out = format!(
        "Analysis {} [{}] {}/{}\nFile: {}\n",
        record.id,
        record.status(),
        record.provider,
        record.model,
        record.file_path
    );
    if let Some(error) = &record.result.error_message {
        let _ = writeln!(out, "Error: {error}");
    }
    if let Some(note) = &record.deployment {
        match (&note.path, &note.error) {
            (Some(path), _) if note.succeeded => {
                let _ = writeln!(out, "Deployed to: {path}");
            }
            (_, Some(error)) => {
                let _ = writeln!(out, "Deployment failed: {error}");
            }
            _ => {}
        }
    }
    out
}

pub fn analysis_row(record: &AnalysisRecord) -> String {
    format!("{}  {:<10} {}", record.id, record.status(), record.file_path)
}

pub fn deployment(record: &DeploymentRecord) -> String {
    let mut out = format!(
        "Deployment {} [{}] via {}\nFile: {}\n",
        record.id,
        record.status,
        record.strategy,
        record.relative_path()
    );
    if let Some(path) = record.delivered_path() {
        let _ = writeln!(out, "Delivered to: {path}");
    }
    if let Some(error) = &record.error_message {
        let _ = writeln!(out, "Error: {error}");
    }
    if let Some(notes) = &record.notes {
        let _ = writeln!(out, "Notes: {notes}");
    }
    out
}

pub fn deployment_row(record: &DeploymentRecord) -> String {
    format!(
        "{}  {:<10} {:<15} {}",
        record.id,
        record.status,
        record.strategy,
        record.relative_path()
    )
}

pub fn command_result(result: &CommandResult) -> String {
    let mut out = String::new();
    out.push_str(&result.stdout);
    if !result.stderr.is_empty() {
        let _ = write!(out, "\n[stderr]\n{}", result.stderr);
    }
    match result.exit_status {
        Some(code) => {
            let _ = write!(out, "\n[exit {code}]");
        }
        None => out.push_str("\n[terminated]"),
    }
    out
}

/// Lines joined, or `empty` when there are none
pub fn rows<T>(items: &[T], render: impl Fn(&T) -> String, empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items.iter().map(render).collect::<Vec<_>>().join("\n")
}

fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max_chars || text.lines().nth(1).is_some() {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_and_multiline_text() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghijkl", 5), "abcde…");
        assert_eq!(preview("first\nsecond", 10), "first…");
    }

    #[test]
    fn test_rows_uses_placeholder_when_empty() {
        let empty: Vec<u32> = Vec::new();
        assert_eq!(rows(&empty, |n| n.to_string(), "nothing"), "nothing");
        assert_eq!(rows(&[1, 2], |n| n.to_string(), "nothing"), "1\n2");
    }

    #[test]
    fn test_command_result_shows_exit_code_and_stderr() {
        let text = command_result(&CommandResult::new(Some(2), "out\n", "bad"));
        assert!(text.starts_with("out\n"));
        assert!(text.contains("[stderr]\nbad"));
        assert!(text.ends_with("[exit 2]"));
    }
}
