// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure Command-Line Argument Parsing
//!
//! Security-first argument validation, shared by both binaries. A daemon that
//! reads a vault path or project directory from argv must not trust that
//! string before it ever touches a filesystem call.
//!
//! ## Dangerous Patterns Detected
//!
//! - `..` - Path traversal
//! - `~` - Home directory expansion
//! - `$` - Variable expansion
//! - Backticks - Command substitution
//! - `;` `&` `|` - Command chaining
//! - `>` `<` - Redirection
//! - Null bytes, newlines, carriage returns

use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_ARG_COUNT: usize = 100;
const MAX_ARG_LENGTH: usize = 1000;
const MAX_PATH_LENGTH: usize = 4096;

const DANGEROUS_PATTERNS: &[&str] = &[
    "..", "~", "$", "`", ";", "&", "|", ">", "<", "\n", "\r", "\0",
];

const PROTECTED_DIRS: &[&str] = &[
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
];

/// Secure argument parsing errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("too many arguments (max {MAX_ARG_COUNT})")]
    TooManyArguments,

    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("dangerous pattern detected in argument: {pattern} in {arg}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("path exceeds maximum length (max {MAX_PATH_LENGTH})")]
    PathTooLong,

    #[error("access to protected system directory denied: {0}")]
    ProtectedDirectory(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error(transparent)]
    Clap(#[from] clap::Error),
}

/// Secure argument parser.
pub struct SecureArgParser;

impl SecureArgParser {
    /// Validate a single argument for shell-injection and traversal patterns.
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(
                arg.chars().take(50).collect::<String>() + "...",
            ));
        }

        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern {
                    pattern: pattern.to_string(),
                    arg: arg.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validate and canonicalize a path that is expected to already exist
    /// (a project directory, an existing vault file).
    pub fn validate_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path).map_err(|e| match e {
            ParseError::ArgumentTooLong(_) => ParseError::InvalidPath(format!("path too long: {path}")),
            ParseError::DangerousPattern { pattern, .. } => {
                ParseError::InvalidPath(format!("path contains dangerous pattern '{pattern}': {path}"))
            }
            other => other,
        })?;

        let path_obj = Path::new(path);

        let canonical = path_obj.canonicalize().map_err(|e| {
            if !path_obj.exists() {
                ParseError::PathNotFound(path.to_string())
            } else {
                ParseError::InvalidPath(format!("{path}: {e}"))
            }
        })?;

        if canonical.to_string_lossy().len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }

        for protected in PROTECTED_DIRS {
            if canonical.starts_with(protected) {
                return Err(ParseError::ProtectedDirectory(canonical.display().to_string()));
            }
        }

        Ok(canonical)
    }

    /// Validate an optional path (may be unset).
    pub fn validate_optional_path(path: Option<&str>) -> Result<Option<PathBuf>, ParseError> {
        match path {
            Some(p) => Self::validate_path(p).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod argument_validation {
        use super::*;

        #[test]
        fn accepts_safe_arguments() {
            assert!(SecureArgParser::validate_argument("safe-arg").is_ok());
            assert!(SecureArgParser::validate_argument("vault.db").is_ok());
            assert!(SecureArgParser::validate_argument("path/to/vault").is_ok());
        }

        #[test]
        fn rejects_too_long_arguments() {
            let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
            assert!(matches!(
                SecureArgParser::validate_argument(&long_arg),
                Err(ParseError::ArgumentTooLong(_))
            ));
        }

        #[test]
        fn detects_dangerous_patterns() {
            let dangerous = vec![
                "../etc/passwd",
                "~/.ssh/id_rsa",
                "$(whoami)",
                "`ls`",
                "file;rm -rf /",
                "file&background",
                "file|pipe",
                "file>output",
                "file<input",
                "file\nwith\nnewlines",
            ];

            for arg in dangerous {
                assert!(
                    matches!(
                        SecureArgParser::validate_argument(arg),
                        Err(ParseError::DangerousPattern { .. })
                    ),
                    "failed to detect dangerous pattern in: {arg}"
                );
            }
        }
    }

    mod path_validation {
        use super::*;

        #[test]
        fn rejects_nonexistent_path() {
            let result = SecureArgParser::validate_path("/this/path/does/not/exist/at/all");
            assert!(matches!(result, Err(ParseError::PathNotFound(_))));
        }

        #[test]
        fn rejects_protected_directory() {
            let result = SecureArgParser::validate_path("/etc");
            assert!(matches!(result, Err(ParseError::ProtectedDirectory(_))));
        }

        #[test]
        fn accepts_optional_none() {
            assert!(SecureArgParser::validate_optional_path(None).unwrap().is_none());
        }
    }
}
