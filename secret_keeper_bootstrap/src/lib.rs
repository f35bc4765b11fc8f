// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the domain and infrastructure layers
//! and provides:
//!
//! - **Entry point** - Daemon lifecycle management
//! - **Signal handling** - Graceful shutdown (SIGTERM, SIGINT, SIGHUP)
//! - **Argument parsing** - Secure CLI argument validation
//! - **Configuration** - Immutable, validated startup configuration
//! - **Error handling** - Unix exit code mapping
//! - **Async coordination** - Shutdown coordination and cancellation
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (This Module)            │
//! │  - Entry Point                              │
//! │  - Signal Handling                          │
//! │  - Secure Arg Parsing                       │
//! │  - Shutdown Coordination                    │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │      APPLICATION / INFRASTRUCTURE           │
//! │  - Vault, policy filter, scrubber           │
//! │  - Rotation engine, daemon mediator         │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │           DOMAIN LAYER                      │
//! │  - Entities & Value Objects                 │
//! │  - Trait Contracts                          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Key Design Principles
//!
//! 1. **Separation from domain/infrastructure** - bootstrap can see every
//!    layer; no other layer depends on bootstrap.
//! 2. **Graceful shutdown** - signal handlers, cancellation token
//!    propagation, grace-period timeout enforcement.
//! 3. **Security first** - every CLI argument is validated before it reaches
//!    a filesystem call.
//! 4. **Testability** - signal handling and logging are behind traits with
//!    no-op test doubles.
//!
//! ## Module Structure
//!
//! - `signals` - Signal handling (SIGTERM, SIGINT, SIGHUP)
//! - `cli` - Secure argument parsing
//! - `config` - Application configuration
//! - `exit_code` - Unix exit code enumeration
//! - `logger` - Bootstrap-specific logging
//! - `shutdown` - Shutdown coordination

pub mod cli;
pub mod config;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

// Re-export commonly used types
pub use cli::{parse_and_validate, ValidatedCli, ValidatedCommand};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Bootstrap and parse CLI arguments
///
/// This is the main entry point for the bootstrap layer.
/// It handles:
/// 1. CLI parsing with clap
/// 2. Security validation
/// 3. Returns validated configuration
///
/// The caller is responsible for:
/// - Running the application logic
/// - Mapping results to exit codes using `result_to_exit_code`
///
/// # Returns
///
/// `ValidatedCli` with all arguments security-checked and validated
///
/// # Errors
///
/// Returns `cli::ParseError` if CLI parsing or validation fails.
/// Clap will handle --help and --version automatically and exit the process.
///
/// # Example
///
/// ```no_run
/// use secret_keeper_bootstrap::bootstrap_cli;
///
/// #[tokio::main]
/// async fn main() {
///     let validated_cli = match bootstrap_cli() {
///         Ok(cli) => cli,
///         Err(e) => {
///             eprintln!("CLI error: {e}");
///             std::process::exit(64); // EX_USAGE
///         }
///     };
///
///     println!("{:?}", validated_cli.command);
/// }
/// ```
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
