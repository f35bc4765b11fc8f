// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions.
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **128+N**: Fatal signal N (e.g. 130 = SIGINT)

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Data format error (65)
    DataError = 65,

    /// Cannot open input (66)
    NoInput = 66,

    /// Service unavailable (69) — the daemon is not running for this project
    Unavailable = 69,

    /// Internal software error (70)
    Software = 70,

    /// System error (71)
    OsError = 71,

    /// I/O error (74)
    IoError = 74,

    /// Permission denied (77)
    NoPerm = 77,

    /// Configuration error (78) — malformed vault, bad master key, etc.
    Config = 78,

    /// Interrupted by SIGINT (130)
    Interrupted = 130,

    /// Terminated by SIGTERM (143)
    Terminated = 143,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map an error to an exit code by inspecting its message.
    ///
    /// Domain errors should implement a more precise mapping where possible;
    /// this is the fallback used at the very top of `main`.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let error_string = error.to_string().to_lowercase();

        if error_string.contains("permission") || error_string.contains("access denied") {
            ExitCode::NoPerm
        } else if error_string.contains("not found") || error_string.contains("no such") {
            ExitCode::NoInput
        } else if error_string.contains("not running") || error_string.contains("unavailable") {
            ExitCode::Unavailable
        } else if error_string.contains("invalid") || error_string.contains("argument") {
            ExitCode::UsageError
        } else if error_string.contains("parse") || error_string.contains("format") {
            ExitCode::DataError
        } else if error_string.contains("io") || error_string.contains("read") || error_string.contains("write") {
            ExitCode::IoError
        } else if error_string.contains("config") || error_string.contains("vault") {
            ExitCode::Config
        } else {
            ExitCode::Error
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "success",
            ExitCode::Error => "general error",
            ExitCode::UsageError => "command line usage error",
            ExitCode::DataError => "data format error",
            ExitCode::NoInput => "cannot open input",
            ExitCode::Unavailable => "service unavailable",
            ExitCode::Software => "internal software error",
            ExitCode::OsError => "system error",
            ExitCode::IoError => "I/O error",
            ExitCode::NoPerm => "permission denied",
            ExitCode::Config => "configuration error",
            ExitCode::Interrupted => "interrupted by signal (SIGINT)",
            ExitCode::Terminated => "terminated by signal (SIGTERM)",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Map a `Result` into a process exit code, printing the error on failure.
///
/// This is the single place `main()` funnels into: every binary ends with
/// `result_to_exit_code(run().await).into()`.
pub fn result_to_exit_code<T, E>(result: Result<T, E>) -> ExitCode
where
    E: std::error::Error,
{
    match result {
        Ok(_) => ExitCode::Success,
        Err(e) => map_error_to_exit_code(&e),
    }
}

/// Map any `std::error::Error` to an `ExitCode`.
pub fn map_error_to_exit_code(error: &dyn std::error::Error) -> ExitCode {
    ExitCode::from_error(error)
}
