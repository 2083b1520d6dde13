use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

use crate::error::RunnerError;

use super::CommandSpec;

// ============================================================================
// ProcessRunner Trait - Secure Process Execution Interface
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output from the process
    pub stdout: Vec<u8>,
    /// Standard error from the process
    pub stderr: Vec<u8>,
    /// Exit code from the process (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Create a new `ProcessOutput` with the given values.
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Get stdout as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for process execution.
///
/// Implementations MUST use argv-style APIs only (no shell string evaluation).
///
/// # Returns
///
/// * `Ok(ProcessOutput)` - The process completed (possibly with non-zero exit code)
/// * `Err(RunnerError::Timeout)` - The process timed out and was killed
/// * `Err(RunnerError::*)` - The process could not be started
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute a command with the given timeout.
    async fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

/// Runs commands on the tokio runtime, killing them when the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let program = cmd.program.to_string_lossy().into_owned();
        debug!(command = %cmd.display(), timeout_secs = timeout.as_secs(), "Spawning process");

        let mut command = cmd.to_tokio_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => RunnerError::ProgramNotFound {
                program: program.clone(),
            },
            _ => RunnerError::SpawnFailed {
                program: program.clone(),
                reason: e.to_string(),
            },
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(program = %program, exit_code = ?output.status.code(), "Process finished");
                Ok(ProcessOutput::new(
                    output.stdout,
                    output.stderr,
                    output.status.code(),
                ))
            }
            Ok(Err(e)) => Err(RunnerError::SpawnFailed {
                program,
                reason: e.to_string(),
            }),
            Err(_) => Err(RunnerError::Timeout {
                timeout_seconds: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_output_success() {
        assert!(ProcessOutput::new(Vec::new(), Vec::new(), Some(0)).success());
        assert!(!ProcessOutput::new(Vec::new(), Vec::new(), Some(1)).success());
        assert!(!ProcessOutput::new(Vec::new(), Vec::new(), None).success());
    }

    #[test]
    fn test_process_output_lossy_utf8() {
        let invalid_utf8 = vec![0xff, 0xfe, 0x00, 0x01];
        let output = ProcessOutput::new(invalid_utf8.clone(), invalid_utf8, Some(0));
        assert!(!output.stdout_string().is_empty());
        assert!(!output.stderr_string().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let cmd = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = TokioProcessRunner
            .run(&cmd, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(output.stdout_string().trim(), "out");
        assert_eq!(output.stderr_string().trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_passes_env() {
        let cmd = CommandSpec::new("sh")
            .args(["-c", "printf %s \"$FLOWSMITH_TEST_VALUE\""])
            .env("FLOWSMITH_TEST_VALUE", "from-env");
        let output = TokioProcessRunner
            .run(&cmd, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.stdout_string(), "from-env");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_times_out() {
        let cmd = CommandSpec::new("sleep").arg("5");
        let err = TokioProcessRunner
            .run(&cmd, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_program() {
        let cmd = CommandSpec::new("flowsmith-definitely-not-a-program");
        let err = TokioProcessRunner
            .run(&cmd, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ProgramNotFound { .. }));
    }
}
