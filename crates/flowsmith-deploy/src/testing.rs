//! In-memory [`RemoteShell`] for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use flowsmith_store::ConnectionDescriptor;

use crate::error::ShellError;
use crate::shell::{CommandResult, RemoteSession, RemoteShell, shell_quote};

#[derive(Default)]
struct State {
    files: HashMap<String, String>,
    directories: Vec<String>,
    commands: Vec<String>,
    last_password: Option<String>,
}

/// Remote host simulated in memory.
///
/// `test -f` checks see uploaded files and `echo` returns its argument.
#[derive(Clone, Default)]
pub struct MockRemoteShell {
    state: Arc<Mutex<State>>,
    connects: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
    refuse: bool,
    lose_uploads: bool,
    command_reply: Option<CommandResult>,
}

impl MockRemoteShell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt fails
    #[must_use]
    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Uploads report success but the file never appears
    #[must_use]
    pub fn lose_uploads(mut self) -> Self {
        self.lose_uploads = true;
        self
    }

    /// Fixed answer for commands other than `test -f` and `echo`
    #[must_use]
    pub fn with_command_reply(mut self, reply: CommandResult) -> Self {
        self.command_reply = Some(reply);
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self, remote_path: &str) -> Option<String> {
        self.lock().files.get(remote_path).cloned()
    }

    pub fn directories(&self) -> Vec<String> {
        self.lock().directories.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Password seen by the most recent connect
    pub fn last_password(&self) -> Option<String> {
        self.lock().last_password.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteShell for MockRemoteShell {
    async fn connect(
        &self,
        connection: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, ShellError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.lock().last_password.clone_from(&connection.password);
        if self.refuse {
            return Err(ShellError::Connect {
                destination: connection.destination(),
                reason: "Connection refused".to_string(),
            });
        }
        Ok(Box::new(MockSession {
            shell: self.clone(),
        }))
    }
}

struct MockSession {
    shell: MockRemoteShell,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn create_directory(&mut self, path: &str) -> Result<bool, ShellError> {
        self.shell.lock().directories.push(path.to_string());
        Ok(true)
    }

    async fn upload_file_content(
        &mut self,
        content: &str,
        remote_path: &str,
    ) -> Result<(), ShellError> {
        if !self.shell.lose_uploads {
            self.shell
                .lock()
                .files
                .insert(remote_path.to_string(), content.to_string());
        }
        Ok(())
    }

    async fn execute_command(&mut self, command: &str) -> Result<CommandResult, ShellError> {
        let mut state = self.shell.lock();
        state.commands.push(command.to_string());

        if let Some(rest) = command.strip_prefix("test -f ") {
            let exists = state
                .files
                .keys()
                .any(|path| rest.starts_with(&shell_quote(path)));
            let stdout = if exists { "exists\n" } else { "" };
            return Ok(CommandResult::new(Some(i32::from(!exists)), stdout, ""));
        }
        if let Some(text) = command.strip_prefix("echo ") {
            return Ok(CommandResult::new(
                Some(0),
                format!("{}\n", text.trim_matches('\'')),
                "",
            ));
        }
        Ok(self
            .shell
            .command_reply
            .clone()
            .unwrap_or_else(|| CommandResult::new(Some(0), "", "")))
    }

    async fn close(&mut self) {
        self.shell.closes.fetch_add(1, Ordering::SeqCst);
    }
}
