use async_trait::async_trait;
use serde::Serialize;

use flowsmith_store::ConnectionDescriptor;

use crate::error::ShellError;

/// Outcome of one remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandResult {
    #[must_use]
    pub fn new(exit_status: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_status,
            stdout: stdout.into(),
            stderr: stderr.into(),
            success: exit_status == Some(0),
        }
    }
}

/// Opens sessions to remote hosts
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Authenticate against `connection`.
    ///
    /// The password wins over the private key when both are present.
    async fn connect(
        &self,
        connection: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, ShellError>;
}

/// An authenticated session. Callers must call [`RemoteSession::close`]
/// on every path once connected.
#[async_trait]
pub trait RemoteSession: Send {
    /// `mkdir -p` on the remote host; `Ok(false)` when the command ran but failed
    async fn create_directory(&mut self, path: &str) -> Result<bool, ShellError>;

    /// Stage `content` locally and copy it to `remote_path`
    async fn upload_file_content(&mut self, content: &str, remote_path: &str)
    -> Result<(), ShellError>;

    async fn execute_command(&mut self, command: &str) -> Result<CommandResult, ShellError>;

    async fn close(&mut self);
}

/// Quote `value` for a POSIX shell on the remote side
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/app/workflows/42"), "'/app/workflows/42'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_command_result_success_follows_exit_status() {
        assert!(CommandResult::new(Some(0), "ok", "").success);
        assert!(!CommandResult::new(Some(2), "", "boom").success);
        assert!(!CommandResult::new(None, "", "").success);
    }
}
