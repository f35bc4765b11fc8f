// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `skctl` — the operator CLI.
//!
//! `init`/`add`/`get`/`list`/`rotate` act on the vault directly (the
//! operator holds the master key); `exec`/`ping`/`shutdown` go through the
//! running daemon over its Unix socket, since only the daemon holds the
//! decrypted secret map used for injection and scrubbing.

use clap::{Parser, Subcommand};
use secret_keeper::crypto::Aes256GcmCrypto;
use secret_keeper::daemon_client::{resolve_socket_path, DaemonClient};
use secret_keeper::rotation_manager::RotationManager;
use secret_keeper::rotation_providers::ProviderRegistry;
use secret_keeper::vault::{resolve_vault_path, Vault};
use secret_keeper_bootstrap::exit_code::result_to_exit_code;
use secret_keeper_domain::{Result, Sensitivity};
use std::path::PathBuf;
use std::sync::Arc;

const SOCKET_DIR_NAME: &str = "secret-keeper";

#[derive(Parser)]
#[command(name = "skctl", about = "Operator CLI for secret-keeperd")]
struct Cli {
    /// Operate against the project-local vault under this directory.
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and unlock a new vault.
    Init,
    /// Drop the loaded master key, requiring it again before further access.
    Lock,
    /// Store a secret.
    Add {
        name: String,
        value: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        credential: bool,
    },
    /// Print a secret's plaintext value.
    Get { name: String },
    /// List stored secret names and metadata.
    List,
    /// Print every secret as `NAME=value` (for piping into a `.env` file).
    Export,
    /// Run a command with the daemon's secret map injected.
    Exec {
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Rotation operations.
    Rotate {
        #[command(subcommand)]
        action: RotateAction,
    },
    /// Check whether the daemon is reachable.
    Ping,
    /// Ask the daemon to shut down.
    Shutdown,
}

#[derive(Subcommand)]
enum RotateAction {
    /// Rotate one secret immediately.
    Now { name: String },
    /// Show configured rotations and which are due.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = dispatch(cli).await;
    if let Err(err) = &result {
        eprintln!("error: {err}");
    }
    std::process::exit(result_to_exit_code(result).as_i32());
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init(cli.project).await,
        Command::Lock => {
            let vault = open_vault(cli.project).await?;
            vault.lock().await?;
            println!("vault locked");
            Ok(())
        }
        Command::Add { name, value, description, tags, credential } => {
            let sensitivity = if credential { Sensitivity::Credential } else { Sensitivity::Sensitive };
            let vault = open_vault(cli.project).await?;
            vault.add_secret(&name, &value, description, tags, sensitivity).await?;
            println!("stored '{name}'");
            Ok(())
        }
        Command::Get { name } => {
            let vault = open_vault(cli.project).await?;
            println!("{}", vault.get_secret(&name).await?);
            Ok(())
        }
        Command::List => {
            let vault = open_vault(cli.project).await?;
            for metadata in vault.list_secrets().await? {
                println!("{}\t{:?}\t{}", metadata.name, metadata.sensitivity, metadata.description.unwrap_or_default());
            }
            Ok(())
        }
        Command::Export => {
            let vault = open_vault(cli.project).await?;
            let mut secrets: Vec<(String, String)> = vault.export_all_secrets().await?.into_iter().collect();
            secrets.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, value) in secrets {
                println!("{name}={value}");
            }
            Ok(())
        }
        Command::Exec { command } => {
            let client = client_for(cli.project)?;
            let joined = command.join(" ");
            let response = client.exec(&joined, None, None).await?;
            if let Some(stdout) = response.get("stdout").and_then(|v| v.as_str()) {
                print!("{stdout}");
            }
            if let Some(stderr) = response.get("stderr").and_then(|v| v.as_str()) {
                eprint!("{stderr}");
            }
            let exit_code = response.get("exitCode").and_then(|v| v.as_i64()).unwrap_or(1);
            std::process::exit(exit_code as i32);
        }
        Command::Rotate { action } => rotate(cli.project, action).await,
        Command::Ping => {
            let client = client_for(cli.project)?;
            let response = client.ping().await?;
            println!("{response}");
            Ok(())
        }
        Command::Shutdown => {
            let client = client_for(cli.project)?;
            client.shutdown().await?;
            println!("shutdown requested");
            Ok(())
        }
    }
}

async fn rotate(project: Option<PathBuf>, action: RotateAction) -> Result<()> {
    let vault = Arc::new(open_vault(project).await?);
    let providers = Arc::new(ProviderRegistry::with_defaults());
    let manager = RotationManager::new(vault, providers);

    match action {
        RotateAction::Now { name } => {
            let new_value_len = manager.rotate_now(&name).await?.len();
            println!("rotated '{name}' ({new_value_len} bytes)");
        }
        RotateAction::Status => {
            let due = manager.due_now().await?.into_iter().map(|c| c.secret_name).collect::<Vec<_>>();
            for config in manager.list().await? {
                let marker = if due.contains(&config.secret_name) { "due" } else { "scheduled" };
                println!("{}\t{}\t{}", config.secret_name, config.provider_tag, marker);
            }
        }
    }
    Ok(())
}

async fn open_vault(project: Option<PathBuf>) -> Result<Vault> {
    let (vault_path, is_project) = resolve_vault_path(project.as_deref(), false)?;
    let crypto = Arc::new(Aes256GcmCrypto::new());
    let vault = Vault::open(&vault_path, is_project, crypto).await?;

    let key = std::env::var("SECRET_KEEPER_PASSWORD").map(String::into_bytes).or_else(|_| {
        let keyfile = vault_path.parent().map(|dir| dir.join(".keyfile")).unwrap_or_default();
        std::fs::read_to_string(&keyfile)
            .map(|s| s.trim().as_bytes().to_vec())
            .map_err(|_| secret_keeper_domain::SecretKeeperError::VaultLocked)
    })?;

    if vault.is_initialized().await? {
        vault.load_key(&key).await?;
    } else {
        vault.initialize(&key).await?;
    }
    Ok(vault)
}

async fn init(project: Option<PathBuf>) -> Result<()> {
    let vault = open_vault(project).await?;
    println!("vault ready with {} secret(s)", vault.count_secrets().await?);
    Ok(())
}

fn client_for(project: Option<PathBuf>) -> Result<DaemonClient> {
    let socket_dir = std::env::temp_dir().join(SOCKET_DIR_NAME);
    let cwd = project.unwrap_or(std::env::current_dir()?);
    let socket = resolve_socket_path(&socket_dir, &cwd);
    Ok(DaemonClient::new(socket))
}
