//! Exit code constants for the flowsmith CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, configuration, or caller input |
//! | 3 | `RECORD_FAILED` | Operation ran but its persisted record ended `failed` |

use crate::error::ErrorKind;

/// Exit codes matching the documented exit code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, configuration or caller input
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// The operation ran to completion but recorded a `failed` status
    pub const RECORD_FAILED: ExitCode = ExitCode(3);

    /// Get the numeric exit code value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an exit code from a raw value
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        Self(code)
    }
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        if kind.is_caller_error() {
            ExitCode::CLI_ARGS
        } else {
            ExitCode::INTERNAL
        }
    }
}
