//! Error types for process execution

use thiserror::Error;

/// Process execution errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Execution timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },
}
