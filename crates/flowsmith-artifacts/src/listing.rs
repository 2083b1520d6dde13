use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::time::SystemTime;

use crate::error::ArtifactError;
use crate::generation::GenerationStatus;
use crate::resolver::{ArtifactQuery, ArtifactResolver};

/// One generated source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub workflow_id: String,
    pub file_name: String,
    pub path: Utf8PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// A resolved artifact with its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDetails {
    pub path: Utf8PathBuf,
    pub workflow_id: Option<String>,
    pub content: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Upstream status of a workflow plus whether its file is usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatusReport {
    pub workflow_id: String,
    pub status: GenerationStatus,
    pub generated_file_path: Option<String>,
    pub file_exists: bool,
    pub error_message: Option<String>,
    pub ready_for_analysis: bool,
}

struct FileTimes {
    size: u64,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

fn file_times(path: &Utf8Path) -> Result<FileTimes, ArtifactError> {
    let meta = fs::metadata(path).map_err(|e| ArtifactError::Unreadable {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    // Not every filesystem records birth time
    let created = meta.created().unwrap_or(modified);
    Ok(FileTimes {
        size: meta.len(),
        created: created.into(),
        modified: modified.into(),
    })
}

impl ArtifactResolver {
    /// Every `<root>/*/*.<ext>` file, newest first
    pub fn list(&self) -> Result<Vec<ArtifactEntry>, ArtifactError> {
        let mut entries = Vec::new();
        for dir in self.workflow_dirs()? {
            let Some(workflow_id) = dir.file_name().map(str::to_string) else {
                continue;
            };
            for file_name in self.source_files(&dir)? {
                let path = dir.join(&file_name);
                let times = file_times(&path)?;
                entries.push(ArtifactEntry {
                    workflow_id: workflow_id.clone(),
                    file_name,
                    path,
                    created_at: times.created,
                    size: times.size,
                });
            }
        }
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(entries)
    }

    /// The most recently created artifact, if any
    pub fn latest(&self) -> Result<Option<ArtifactEntry>, ArtifactError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Resolve and read an artifact
    pub fn details(&self, query: &ArtifactQuery) -> Result<ArtifactDetails, ArtifactError> {
        let resolved = self.resolve(query)?;
        read_details(&resolved.path, resolved.workflow_id)
    }

    /// Upstream status of `workflow_id`.
    ///
    /// The file only counts as present once generation completed and the
    /// reported path (or the single source file in the workflow directory)
    /// exists.
    pub fn status(&self, workflow_id: &str) -> Result<WorkflowStatusReport, ArtifactError> {
        let record =
            self.lookup()
                .status(workflow_id)?
                .ok_or_else(|| ArtifactError::WorkflowUnavailable {
                    workflow_id: workflow_id.to_string(),
                    reason: "does not exist upstream".to_string(),
                })?;

        let generated_file_path = record.generated_file_path.clone().or_else(|| {
            let dir = self.workflow_dir(workflow_id)?;
            let files = self.source_files(&dir).ok()?;
            match files.as_slice() {
                [only] => Some(dir.join(only).to_string()),
                _ => None,
            }
        });

        let file_exists = record.status == GenerationStatus::Completed
            && generated_file_path
                .as_deref()
                .is_some_and(|p| Utf8Path::new(p).is_file());

        Ok(WorkflowStatusReport {
            workflow_id: workflow_id.to_string(),
            status: record.status,
            generated_file_path,
            file_exists,
            error_message: record.error_message,
            ready_for_analysis: file_exists,
        })
    }
}

/// Read an artifact's content and file metadata
pub fn read_details(
    path: &Utf8Path,
    workflow_id: Option<String>,
) -> Result<ArtifactDetails, ArtifactError> {
    let content = fs::read_to_string(path).map_err(|e| ArtifactError::Unreadable {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let times = file_times(path)?;
    Ok(ArtifactDetails {
        path: path.to_path_buf(),
        workflow_id,
        content,
        size: times.size,
        created_at: times.created,
        modified_at: times.modified,
    })
}
