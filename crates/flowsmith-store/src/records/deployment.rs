use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::Record;

/// `pending → uploading → {completed, failed}`; never backwards
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl DeploymentStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Uploading => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a retry may be created from this status
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Failed | Self::Pending)
    }
}

/// How an artifact reached the execution host
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeployStrategyKind {
    SharedStorage,
    RemoteShell,
}

/// One delivery attempt of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub connection_name: String,
    pub file_name: String,
    pub content: String,
    pub workflow_id: Option<String>,
    pub local_path: Option<String>,
    pub remote_path: Option<String>,
    pub strategy: DeployStrategyKind,
    pub status: DeploymentStatus,
    pub error_message: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    #[must_use]
    pub fn new(
        connection_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<String>,
        workflow_id: Option<String>,
        strategy: DeployStrategyKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_name: connection_name.into(),
            file_name: file_name.into(),
            content: content.into(),
            workflow_id,
            local_path: None,
            remote_path: None,
            strategy,
            status: DeploymentStatus::Pending,
            error_message: None,
            notes: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Path relative to a deployment base: `<workflow_id>/<file>` or
    /// `generated_files/<file>`
    #[must_use]
    pub fn relative_path(&self) -> String {
        relative_path(self.workflow_id.as_deref(), &self.file_name)
    }

    /// Where the artifact ended up, preferring the remote path
    #[must_use]
    pub fn delivered_path(&self) -> Option<&str> {
        self.remote_path.as_deref().or(self.local_path.as_deref())
    }

    fn advance(&mut self, to: DeploymentStatus) -> Result<(), StoreError> {
        if to.rank() <= self.status.rank() {
            return Err(StoreError::InvalidState {
                collection: Self::COLLECTION.to_string(),
                id: self.id.to_string(),
                status: self.status.to_string(),
                action: format!("move to {to}"),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_uploading(&mut self) -> Result<(), StoreError> {
        self.advance(DeploymentStatus::Uploading)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), StoreError> {
        self.advance(DeploymentStatus::Completed)?;
        self.started_at.get_or_insert_with(Utc::now);
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), StoreError> {
        self.advance(DeploymentStatus::Failed)?;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// Shared layout for remote and shared-storage destinations
#[must_use]
pub fn relative_path(workflow_id: Option<&str>, file_name: &str) -> String {
    match workflow_id.filter(|id| !id.is_empty()) {
        Some(id) => format!("{id}/{file_name}"),
        None => format!("generated_files/{file_name}"),
    }
}

impl Record for DeploymentRecord {
    const COLLECTION: &'static str = "deployments";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(workflow_id: Option<&str>) -> DeploymentRecord {
        DeploymentRecord::new(
            "ml_runner",
            "model.py",
            "x=1",
            workflow_id.map(str::to_string),
            DeployStrategyKind::RemoteShell,
        )
    }

    #[test]
    fn test_relative_path_layout() {
        assert_eq!(record(Some("42")).relative_path(), "42/model.py");
        assert_eq!(record(None).relative_path(), "generated_files/model.py");
        assert_eq!(record(Some("")).relative_path(), "generated_files/model.py");
    }

    #[test]
    fn test_status_moves_forward_only() {
        let mut r = record(None);
        r.mark_uploading().unwrap();
        assert!(r.started_at.is_some());
        assert!(r.mark_uploading().is_err());
        r.mark_failed("scp exited 1").unwrap();
        assert!(r.mark_completed().is_err());
        assert_eq!(r.status, DeploymentStatus::Failed);
        assert_eq!(r.error_message.as_deref(), Some("scp exited 1"));
    }

    #[test]
    fn test_pending_can_complete_directly() {
        let mut r = record(Some("7"));
        r.mark_completed().unwrap();
        assert!(r.started_at.is_some());
        assert!(r.completed_at.is_some());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(DeploymentStatus::Failed.is_retryable());
        assert!(DeploymentStatus::Pending.is_retryable());
        assert!(!DeploymentStatus::Uploading.is_retryable());
        assert!(!DeploymentStatus::Completed.is_retryable());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(DeployStrategyKind::SharedStorage.to_string(), "shared_storage");
        assert_eq!(
            serde_json::to_string(&DeployStrategyKind::RemoteShell).unwrap(),
            "\"remote_shell\""
        );
    }
}
