// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse_cli()             │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `parser` - CLI structure and clap parsing
//! - `validator` - Security validation layer

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli, Commands};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

/// Validated CLI configuration for `secret-keeperd`.
///
/// All paths have been canonicalized and checked against the dangerous
/// argument patterns before the daemon acts on them.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
}

/// Validated command variants.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Run {
        project: Option<PathBuf>,
        global: bool,
        force_local: bool,
    },
}

/// Parse and validate CLI arguments in one step.
///
/// # Errors
///
/// Returns `ParseError` if any argument fails security validation.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

/// Apply security validation to parsed CLI arguments.
fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let command = match cli.command {
        Commands::Run {
            project,
            global,
            force_local,
        } => {
            let validated_project = if let Some(ref path) = project {
                Some(SecureArgParser::validate_path(&path.to_string_lossy())?)
            } else {
                None
            };

            ValidatedCommand::Run {
                project: validated_project,
                global,
                force_local,
            }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_cli_rejects_dangerous_project_path() {
        let cli = Cli {
            command: Commands::Run {
                project: Some(PathBuf::from("../etc/passwd")),
                global: false,
                force_local: false,
            },
            verbose: false,
        };

        let result = validate_cli(cli);
        assert!(result.is_err());
    }

    #[test]
    fn validate_cli_accepts_global() {
        let cli = Cli {
            command: Commands::Run {
                project: None,
                global: true,
                force_local: true,
            },
            verbose: true,
        };

        let validated = validate_cli(cli).expect("global run should validate");
        assert!(validated.verbose);
        match validated.command {
            ValidatedCommand::Run { project, global, force_local } => {
                assert!(project.is_none());
                assert!(global);
                assert!(force_local);
            }
        }
    }
}
