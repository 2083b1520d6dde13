pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod redaction;

pub use error::{ConfigError, ErrorCategory, ErrorKind, UserFriendlyError, display_for_user};
pub use exit_codes::ExitCode;
