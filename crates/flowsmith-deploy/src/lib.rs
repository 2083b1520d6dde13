//! Delivery of generated artifacts to the execution host
//!
//! Two strategies are tried in order by the [`DeploymentDispatcher`]: a
//! write into a directory shared with the host, then an ssh/scp upload.
//! Every remote attempt is persisted as a
//! [`DeploymentRecord`](flowsmith_store::DeploymentRecord).

pub mod dispatcher;
pub mod error;
pub mod shell;
pub mod ssh;
pub mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use dispatcher::{ConnectionTestReport, DeploymentDispatcher, connection_template};
pub use error::{DeployError, ShellError};
pub use shell::{CommandResult, RemoteSession, RemoteShell, shell_quote};
pub use ssh::SshCli;
pub use strategy::{DeployStrategy, DeployTarget, RemoteShellStrategy, SharedStorageStrategy};
