use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{CallResult, RequestStatus};
use crate::store::Record;

/// Best-effort deployment outcome attached to an analysis.
///
/// Kept apart from the analysis status: a failed deployment never turns a
/// completed rewrite into a failed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentNote {
    pub succeeded: bool,
    /// Record created by the attempt, when one was persisted
    pub deployment_id: Option<Uuid>,
    /// Local or remote path the artifact was delivered to
    pub path: Option<String>,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl DeploymentNote {
    #[must_use]
    pub fn delivered(deployment_id: Uuid, path: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            deployment_id: Some(deployment_id),
            path: Some(path.into()),
            error: None,
            attempted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(deployment_id: Option<Uuid>, error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            deployment_id,
            path: None,
            error: Some(error.into()),
            attempted_at: Utc::now(),
        }
    }
}

/// One code-improvement round over a workflow artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub file_path: String,
    pub workflow_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub user_instructions: Option<String>,
    pub original_content: Option<String>,
    pub improved_content: Option<String>,
    #[serde(flatten)]
    pub result: CallResult,
    pub deployment: Option<DeploymentNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            workflow_id: None,
            provider: provider.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_instructions: None,
            original_content: None,
            improved_content: None,
            result: CallResult::default(),
            deployment: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.result.status
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Record for AnalysisRecord {
    const COLLECTION: &'static str = "analyses";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_analysis_is_pending_without_note() {
        let analysis = AnalysisRecord::new("/w/42/model.py", "openai", "gpt-4o", "sys");
        assert_eq!(analysis.status(), RequestStatus::Pending);
        assert!(analysis.deployment.is_none());
    }

    #[test]
    fn test_note_constructors() {
        let id = Uuid::new_v4();
        let ok = DeploymentNote::delivered(id, "/app/workflows/42/model.py");
        assert!(ok.succeeded);
        assert_eq!(ok.deployment_id, Some(id));

        let failed = DeploymentNote::failed(None, "no route to host");
        assert!(!failed.succeeded);
        assert_eq!(failed.error.as_deref(), Some("no route to host"));
    }
}
