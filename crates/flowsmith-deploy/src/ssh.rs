//! [`RemoteShell`] backed by the system `ssh`, `scp` and `sshpass` binaries.
//!
//! Each remote operation is a separate argv-style invocation through a
//! [`ProcessRunner`]. Passwords reach `sshpass` through the `SSHPASS`
//! environment variable and never appear on a command line.

use async_trait::async_trait;
use camino::Utf8Path;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, warn};

use flowsmith_config::DeployConfig;
use flowsmith_runner::{CommandSpec, ProcessRunner, RunnerError, TokioProcessRunner};
use flowsmith_store::ConnectionDescriptor;

use crate::error::ShellError;
use crate::shell::{CommandResult, RemoteSession, RemoteShell, shell_quote};

#[derive(Clone)]
enum Auth {
    Password(String),
    Key(String),
}

/// ssh/scp client settings
#[derive(Clone)]
pub struct SshCli {
    runner: Arc<dyn ProcessRunner>,
    ssh_program: String,
    scp_program: String,
    sshpass_program: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    verify_tools: bool,
}

impl SshCli {
    /// Client using the configured binaries and timeouts on the tokio runtime
    #[must_use]
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner)).verify_tools(true)
    }

    /// Client running its commands through `runner`
    #[must_use]
    pub fn with_runner(config: &DeployConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            ssh_program: config.ssh_program.clone(),
            scp_program: config.scp_program.clone(),
            sshpass_program: config.sshpass_program.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            verify_tools: false,
        }
    }

    /// Look the binaries up on `PATH` before connecting
    #[must_use]
    pub fn verify_tools(mut self, verify: bool) -> Self {
        self.verify_tools = verify;
        self
    }

    /// Fail with [`ShellError::MissingTool`] for the first binary not on `PATH`
    pub fn check_tools(&self, password_auth: bool) -> Result<(), ShellError> {
        let mut programs = vec![&self.ssh_program, &self.scp_program];
        if password_auth {
            programs.push(&self.sshpass_program);
        }
        for program in programs {
            which::which(program).map_err(|_| ShellError::MissingTool {
                program: program.clone(),
            })?;
        }
        Ok(())
    }

    fn common_options(&self, auth: &Auth) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ];
        match auth {
            Auth::Password(_) => options.extend([
                "-o".to_string(),
                "PubkeyAuthentication=no".to_string(),
            ]),
            Auth::Key(path) => options.extend([
                "-i".to_string(),
                path.clone(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
            ]),
        }
        options
    }

    fn authenticate(spec: CommandSpec, auth: &Auth, sshpass: &str) -> CommandSpec {
        match auth {
            Auth::Password(password) => spec.env("SSHPASS", password).wrapped_by(sshpass, ["-e"]),
            Auth::Key(_) => spec,
        }
    }
}

fn choose_auth(connection: &ConnectionDescriptor) -> Option<Auth> {
    if let Some(password) = connection.password.as_deref().filter(|p| !p.is_empty()) {
        return Some(Auth::Password(password.to_string()));
    }
    connection
        .private_key_path
        .as_deref()
        .filter(|path| Utf8Path::new(path).is_file())
        .map(|path| Auth::Key(path.to_string()))
}

fn runner_reason(err: &RunnerError) -> String {
    match err {
        RunnerError::Timeout { timeout_seconds } => {
            format!("no answer within {timeout_seconds} seconds")
        }
        other => other.to_string(),
    }
}

fn failure_reason(result: &CommandResult) -> String {
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        match result.exit_status {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl RemoteShell for SshCli {
    async fn connect(
        &self,
        connection: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, ShellError> {
        let destination = connection.destination();
        let auth = choose_auth(connection).ok_or_else(|| ShellError::Connect {
            destination: destination.clone(),
            reason: "no valid credentials: set a password or an existing private key".to_string(),
        })?;
        if self.verify_tools {
            self.check_tools(matches!(auth, Auth::Password(_)))?;
        }

        let staging = tempfile::Builder::new()
            .prefix("flowsmith-upload-")
            .tempdir()
            .map_err(|e| ShellError::Connect {
                destination: destination.clone(),
                reason: format!("cannot create staging directory: {e}"),
            })?;

        let mut session = SshSession {
            cli: self.clone(),
            destination: destination.clone(),
            port: connection.port,
            auth,
            staging: Some(staging),
        };

        // Cheap round trip to prove the host is reachable and accepts us
        let probe = session
            .run_ssh("true", self.connect_timeout)
            .await
            .map_err(|e| ShellError::Connect {
                destination: destination.clone(),
                reason: runner_reason(&e),
            })?;
        if !probe.success {
            session.close().await;
            return Err(ShellError::Connect {
                destination,
                reason: failure_reason(&probe),
            });
        }

        debug!(destination = %session.destination, port = session.port, "Connected");
        Ok(Box::new(session))
    }
}

struct SshSession {
    cli: SshCli,
    destination: String,
    port: u16,
    auth: Auth,
    staging: Option<TempDir>,
}

impl SshSession {
    async fn run_ssh(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError> {
        let spec = CommandSpec::new(&self.cli.ssh_program)
            .args(self.cli.common_options(&self.auth))
            .arg("-p")
            .arg(self.port.to_string())
            .arg(&self.destination)
            .arg("--")
            .arg(command);
        let spec = SshCli::authenticate(spec, &self.auth, &self.cli.sshpass_program);
        let output = self.cli.runner.run(&spec, timeout).await?;
        Ok(CommandResult::new(
            output.exit_code,
            output.stdout_string(),
            output.stderr_string(),
        ))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn create_directory(&mut self, path: &str) -> Result<bool, ShellError> {
        let command = format!("mkdir -p {}", shell_quote(path));
        let result = self.execute_command(&command).await?;
        if !result.success {
            warn!(path, reason = %failure_reason(&result), "Remote mkdir failed");
        }
        Ok(result.success)
    }

    async fn upload_file_content(
        &mut self,
        content: &str,
        remote_path: &str,
    ) -> Result<(), ShellError> {
        let transfer_error = |reason: String| ShellError::Transfer {
            remote_path: remote_path.to_string(),
            reason,
        };
        let staging = self
            .staging
            .as_ref()
            .ok_or_else(|| transfer_error("session is closed".to_string()))?;

        let mut staged = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(staging.path())
            .map_err(|e| transfer_error(e.to_string()))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(|e| transfer_error(e.to_string()))?;

        // SFTP mode: the remote path is never seen by a remote shell
        let spec = CommandSpec::new(&self.cli.scp_program)
            .args(self.cli.common_options(&self.auth))
            .arg("-s")
            .arg("-P")
            .arg(self.port.to_string())
            .arg(staged.path())
            .arg(format!("{}:{remote_path}", self.destination));
        let spec = SshCli::authenticate(spec, &self.auth, &self.cli.sshpass_program);

        let output = self
            .cli
            .runner
            .run(&spec, self.cli.command_timeout)
            .await
            .map_err(|e| transfer_error(runner_reason(&e)))?;
        if !output.success() {
            let result =
                CommandResult::new(output.exit_code, String::new(), output.stderr_string());
            return Err(transfer_error(failure_reason(&result)));
        }
        debug!(remote_path, bytes = content.len(), "Uploaded file");
        Ok(())
    }

    async fn execute_command(&mut self, command: &str) -> Result<CommandResult, ShellError> {
        self.run_ssh(command, self.cli.command_timeout)
            .await
            .map_err(|e| ShellError::Command {
                command: command.to_string(),
                reason: runner_reason(&e),
            })
    }

    async fn close(&mut self) {
        // Removing the staging directory is all there is to tear down
        if let Some(staging) = self.staging.take()
            && let Err(e) = staging.close()
        {
            warn!(error = %e, "Failed to remove upload staging directory");
        }
        debug!(destination = %self.destination, "Session closed");
    }
}
