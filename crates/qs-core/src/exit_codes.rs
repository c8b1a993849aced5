//! Exit codes for the qs-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.

/// Exit codes for qs-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Everything requested succeeded
    Clean = 0,

    /// A capture was refused by a precondition
    CaptureRejected = 1,

    /// Install requested with nothing saved
    NothingSaved = 2,

    /// Install or demo verification failed
    InstallFailed = 3,

    /// Configuration error
    ConfigError = 10,

    /// I/O error
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for a unified error.
    pub fn for_error(err: &qs_common::Error) -> Self {
        match err.code() {
            10..=19 => ExitCode::ConfigError,
            40 => ExitCode::NothingSaved,
            41 => ExitCode::CaptureRejected,
            30..=39 | 42 => ExitCode::InstallFailed,
            60..=69 => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
