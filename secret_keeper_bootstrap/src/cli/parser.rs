// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # `secret-keeperd` CLI Structure
//!
//! Defines the daemon's command-line surface with `clap`. The operator-facing
//! `skctl` binary has its own, much smaller, argument surface and does not use
//! this parser.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Local secret manager daemon.
#[derive(Debug, Parser)]
#[command(name = "secret-keeperd", version, about = "Local secret manager daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the daemon in the foreground, listening on its Unix socket.
    Run {
        /// Bind to the per-project socket rooted at this directory instead of
        /// the current working directory.
        #[arg(long, value_name = "DIR", conflicts_with = "global")]
        project: Option<PathBuf>,

        /// Bind to the global (cross-project) socket and vault instead of a
        /// per-project one.
        #[arg(long, conflicts_with = "project")]
        global: bool,

        /// Refuse to fall back to the global vault when no project vault is
        /// found; fail instead of silently widening scope.
        #[arg(long)]
        force_local: bool,
    },
}

/// Parse CLI arguments, letting clap print usage/version and exit on its own.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_asserts_are_satisfied() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_project() {
        let cli = Cli::parse_from(["secret-keeperd", "run", "--project", "."]);
        match cli.command {
            Commands::Run { project, global, force_local } => {
                assert_eq!(project, Some(PathBuf::from(".")));
                assert!(!global);
                assert!(!force_local);
            }
        }
    }

    #[test]
    fn parses_run_global() {
        let cli = Cli::parse_from(["secret-keeperd", "run", "--global"]);
        match cli.command {
            Commands::Run { project, global, .. } => {
                assert!(project.is_none());
                assert!(global);
            }
        }
    }

    #[test]
    fn rejects_project_and_global_together() {
        let result = Cli::try_parse_from(["secret-keeperd", "run", "--project", ".", "--global"]);
        assert!(result.is_err());
    }
}
