// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `secret-keeperd` — the daemon entry point.

use secret_keeper::crypto::Aes256GcmCrypto;
use secret_keeper::daemon::{socket_path, Daemon};
use secret_keeper::policy::CommandPolicyFilter;
use secret_keeper::rotation_manager::{RotationManager, RotationScheduler};
use secret_keeper::rotation_providers::ProviderRegistry;
use secret_keeper::vault::{resolve_vault_path, Vault};
use secret_keeper_bootstrap::config::{AppConfig, LogLevel};
use secret_keeper_bootstrap::exit_code::{map_error_to_exit_code, ExitCode};
use secret_keeper_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use secret_keeper_bootstrap::shutdown::ShutdownCoordinator;
use secret_keeper_bootstrap::signals::{create_signal_handler, SystemSignals};
use secret_keeper_bootstrap::{bootstrap_cli, ValidatedCommand};
use secret_keeper_domain::CryptoProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SOCKET_DIR_NAME: &str = "secret-keeper";
const ROTATION_TICK: Duration = Duration::from_secs(3600);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let exit = run().await;
    std::process::exit(i32::from(exit));
}

async fn run() -> ExitCode {
    let bootstrap_logger = ConsoleLogger::with_prefix("secret-keeperd");

    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            bootstrap_logger.error(&format!("argument error: {err}"));
            return ExitCode::UsageError;
        }
    };

    let log_level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    tracing_subscriber::fmt().with_max_level(log_level.to_tracing_level()).init();

    let ValidatedCommand::Run { project, global, force_local } = cli.command;

    let config = {
        let mut builder = AppConfig::builder().app_name("secret-keeperd").log_level(log_level).global(global).force_local(force_local);
        if let Some(project) = &project {
            builder = builder.project_root(project.clone());
        }
        builder.build()
    };

    bootstrap_logger.info(&format!("starting with log level {:?}", config.log_level()));

    match serve(config).await {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            tracing::error!(error = %err, "daemon exited with an error");
            map_error_to_exit_code(&err)
        }
    }
}

async fn serve(config: AppConfig) -> secret_keeper_domain::Result<()> {
    let (vault_path, is_project) = if config.is_global() {
        let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
            secret_keeper_domain::SecretKeeperError::Storage("HOME is not set".to_string())
        })?;
        (home.join(".secret-keeper").join("secrets.db"), false)
    } else {
        resolve_vault_path(config.project_root().map(PathBuf::as_path), config.is_force_local())?
    };

    tracing::info!(vault = %vault_path.display(), project = is_project, "opening vault");

    let crypto = Arc::new(Aes256GcmCrypto::new());
    let vault = Arc::new(Vault::open(&vault_path, is_project, crypto.clone()).await?);

    let vault_dir = vault_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let key = load_or_generate_key(&vault_dir, crypto.as_ref())?;

    if vault.is_initialized().await? {
        vault.load_key(&key).await?;
    } else {
        vault.initialize(&key).await?;
    }

    let socket_dir = std::env::temp_dir().join(SOCKET_DIR_NAME);

    let socket = if is_project {
        let project_root = vault_dir.parent().map(Path::to_path_buf).unwrap_or(vault_dir.clone());
        socket_path(&socket_dir, Some(&project_root))
    } else {
        socket_path(&socket_dir, None)
    };

    let policy = Arc::new(CommandPolicyFilter::new());
    let cwd = std::env::current_dir()?;
    let daemon = Arc::new(Daemon::new(vault.clone(), policy, socket, cwd).await?);

    let providers = Arc::new(ProviderRegistry::with_defaults());
    let manager = Arc::new(RotationManager::new(vault.clone(), providers));

    let rotation_log_path = socket_dir.join("rotation.log");
    let daemon_for_callback = Arc::clone(&daemon);
    let callback: secret_keeper::rotation_manager::RotationCallback = Arc::new(move |outcomes| {
        for (secret_name, outcome) in outcomes {
            let line = match outcome {
                Ok(_) => format!("{} rotation succeeded for {secret_name}\n", chrono::Utc::now().to_rfc3339()),
                Err(err) => format!("{} rotation failed for {secret_name}: {err}\n", chrono::Utc::now().to_rfc3339()),
            };
            append_log_line(&rotation_log_path, &line);
        }
        let daemon = Arc::clone(&daemon_for_callback);
        tokio::spawn(async move {
            if let Err(err) = daemon.reload_secrets().await {
                tracing::error!(error = %err, "failed to reload secrets after rotation");
            }
        });
    });

    let scheduler = Arc::new(RotationScheduler::new(manager, ROTATION_TICK, Some(callback)));
    scheduler.start().await;

    // The daemon's listen loop is driven by a watch channel; the
    // coordinator owns the actual shutdown decision (signal or grace
    // period) and flips it.
    let coordinator = Arc::new(ShutdownCoordinator::new(SHUTDOWN_GRACE_PERIOD));
    let token = coordinator.token();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        token.cancelled().await;
        let _ = shutdown_tx.send(true);
    });

    let signal_coordinator = Arc::clone(&coordinator);
    let signal_handler = create_signal_handler();
    tokio::spawn(async move {
        signal_handler
            .wait_for_signal(Box::new(move || {
                signal_coordinator.initiate_shutdown();
            }))
            .await;
    });

    tracing::info!("secret-keeperd ready");
    let run_result = daemon.run(shutdown_rx).await;

    scheduler.stop().await;
    coordinator.complete_shutdown();
    tracing::info!("secret-keeperd shut down");
    run_result
}

fn append_log_line(path: &Path, line: &str) {
    use std::io::Write;
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Resolve the master key: `SECRET_KEEPER_PASSWORD` takes precedence; the
/// keyfile under the vault directory is the non-interactive fallback,
/// generated on first run (§6).
fn load_or_generate_key(vault_dir: &Path, crypto: &Aes256GcmCrypto) -> secret_keeper_domain::Result<Vec<u8>> {
    if let Ok(password) = std::env::var("SECRET_KEEPER_PASSWORD") {
        return Ok(password.into_bytes());
    }

    let keyfile = vault_dir.join(".keyfile");
    if keyfile.exists() {
        let contents = std::fs::read_to_string(&keyfile)?;
        return Ok(contents.trim().as_bytes().to_vec());
    }

    let generated = crypto.generate_key();
    std::fs::create_dir_all(vault_dir)?;
    std::fs::write(&keyfile, &generated)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&keyfile, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(generated.into_bytes())
}
