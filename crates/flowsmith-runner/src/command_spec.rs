use std::collections::HashMap;
use std::ffi::OsString;
use tokio::process::Command as TokioCommand;

/// A program invocation: program, argv and extra environment.
///
/// All process execution goes through this type to ensure argv-style invocation.
///
/// # Security
///
/// `CommandSpec` enforces that:
/// - Arguments are `Vec<OsString>`, NOT shell strings
/// - No local shell evaluation (`sh -c`) is used
/// - Environment values are never included in [`CommandSpec::display`]
///
/// # Example
///
/// ```rust
/// use flowsmith_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("ssh")
///     .args(["-p", "22"])
///     .arg("root@ml_runner")
///     .env("SSHPASS", "secret");
///
/// assert_eq!(cmd.program, OsString::from("ssh"));
/// assert_eq!(cmd.args.len(), 3);
/// assert!(!cmd.display().contains("secret"));
/// ```
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` with the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: None,
        }
    }

    /// Add a single argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the command.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Prefix the command with a wrapper program, keeping the environment.
    ///
    /// `CommandSpec::new("ssh").arg("host").wrapped_by("sshpass", ["-e"])`
    /// becomes `sshpass -e ssh host`.
    #[must_use]
    pub fn wrapped_by<I, S>(self, wrapper: impl Into<OsString>, wrapper_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut args: Vec<OsString> = wrapper_args.into_iter().map(Into::into).collect();
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: wrapper.into(),
            args,
            env: self.env,
        }
    }

    /// Human-readable command line for logs.
    ///
    /// Environment values are omitted; only variable names are listed.
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        if let Some(env) = &self.env {
            let mut keys: Vec<String> = env
                .keys()
                .map(|k| format!("{}=…", k.to_string_lossy()))
                .collect();
            keys.sort();
            parts.extend(keys);
        }
        parts.push(self.program.to_string_lossy().into_owned());
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    /// Convert this `CommandSpec` into a `tokio::process::Command`.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_args_in_order() {
        let cmd = CommandSpec::new("scp")
            .arg("-P")
            .arg("2222")
            .args(["/tmp/a.py", "root@host:/app/workflows/a.py"]);

        let args: Vec<String> = cmd
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-P", "2222", "/tmp/a.py", "root@host:/app/workflows/a.py"]
        );
    }

    #[test]
    fn test_args_with_spaces_stay_single_elements() {
        let cmd = CommandSpec::new("ssh").arg("mkdir -p \"/app/my dir\"");
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn test_wrapped_by_moves_program_into_args() {
        let cmd = CommandSpec::new("ssh")
            .arg("root@host")
            .env("SSHPASS", "pw")
            .wrapped_by("sshpass", ["-e"]);

        assert_eq!(cmd.program, OsString::from("sshpass"));
        let args: Vec<String> = cmd
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-e", "ssh", "root@host"]);
        assert!(cmd.env.unwrap().contains_key(&OsString::from("SSHPASS")));
    }

    #[test]
    fn test_display_hides_env_values() {
        let cmd = CommandSpec::new("sshpass")
            .arg("-e")
            .env("SSHPASS", "hunter2");
        let shown = cmd.display();
        assert_eq!(shown, "SSHPASS=… sshpass -e");
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_to_tokio_command_carries_env() {
        let cmd = CommandSpec::new("echo").arg("hi").env("SSHPASS", "pw");
        let tokio_cmd = cmd.to_tokio_command();
        let std_cmd = tokio_cmd.as_std();
        assert_eq!(std_cmd.get_program(), "echo");
        let envs: Vec<_> = std_cmd.get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, "SSHPASS");
    }
}
