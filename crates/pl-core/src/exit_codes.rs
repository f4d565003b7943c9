//! Exit codes for the pl-core CLI.
//!
//! Exit codes tell the calling job runner which stage failed without
//! requiring output parsing. They follow the failure codes of
//! [`FailureKind`].

use pl_common::FailureKind;

/// Exit codes for pl-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Partition built and published, or config valid
    Success = 0,

    /// Configuration error
    ConfigError = 10,

    /// Working directory or pipe could not be prepared
    SetupError = 30,

    /// Builder could not be started
    LaunchError = 31,

    /// Builder exited unsuccessfully
    ExecutionError = 32,

    /// Rows could not be written to the builder
    WriteError = 33,

    /// Builder exceeded its time limit
    Timeout = 34,

    /// Fragment could not be archived
    ArchiveError = 40,

    /// Archive could not be staged or published
    PublishError = 41,

    /// Input rows could not be read
    InputError = 60,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }
}

impl From<FailureKind> for ExitCode {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Config => ExitCode::ConfigError,
            FailureKind::Setup => ExitCode::SetupError,
            FailureKind::Launch => ExitCode::LaunchError,
            FailureKind::Execution => ExitCode::ExecutionError,
            FailureKind::Write => ExitCode::WriteError,
            FailureKind::Timeout => ExitCode::Timeout,
            FailureKind::Archive => ExitCode::ArchiveError,
            FailureKind::Publish => ExitCode::PublishError,
            // Cleanup failures never abort a run.
            FailureKind::Cleanup => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_keep_their_codes() {
        for kind in [
            FailureKind::Config,
            FailureKind::Setup,
            FailureKind::Launch,
            FailureKind::Execution,
            FailureKind::Write,
            FailureKind::Timeout,
            FailureKind::Archive,
            FailureKind::Publish,
        ] {
            assert_eq!(ExitCode::from(kind).as_i32() as u32, kind.code());
        }
    }

    #[test]
    fn only_success_is_success() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::PublishError.is_success());
        assert_eq!(i32::from(ExitCode::InternalError), 99);
    }
}
