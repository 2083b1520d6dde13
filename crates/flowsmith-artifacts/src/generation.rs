use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use crate::error::ArtifactError;

/// Status of an upstream workflow generation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// What the generator reports about one workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub generated_file_path: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Source of upstream generation status
pub trait GenerationLookup: Send + Sync {
    /// `Ok(None)` when the generator has never heard of `workflow_id`
    fn status(&self, workflow_id: &str) -> Result<Option<GenerationRecord>, ArtifactError>;
}

/// Reads `<dir>/<workflow_id>.json` records written by the generator
#[derive(Debug, Clone)]
pub struct FileGenerationLookup {
    dir: Utf8PathBuf,
}

impl FileGenerationLookup {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

impl GenerationLookup for FileGenerationLookup {
    fn status(&self, workflow_id: &str) -> Result<Option<GenerationRecord>, ArtifactError> {
        if workflow_id.contains(['/', '\\']) || workflow_id.starts_with('.') {
            return Ok(None);
        }
        let path = self.dir.join(format!("{workflow_id}.json"));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ArtifactError::Lookup {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ArtifactError::Lookup {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}
