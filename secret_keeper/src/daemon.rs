// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Daemon Mediator (C7)
//!
//! Owns the decrypted secret set, accepts IPC requests over a Unix-domain
//! socket, applies the policy filter (C3) and output scrubber (C4), spawns
//! requested commands, and reloads its secret map when the rotation
//! scheduler (C6) completes a rotation.
//!
//! The secret map and scrubber are swapped as one atomic unit (Design
//! Note 9): a single `RwLock<Arc<Epoch>>` guarantees no in-flight scrub can
//! observe a map from one rotation and a scrubber from another.

use crate::scrubber::SecretScrubber;
use crate::vault::Vault;
use secret_keeper_domain::{OutputScrubber, PolicyFilter, Result, SecretKeeperError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use zeroize::Zeroize;

/// Hard cap on one request's wire size (§4.7).
const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 300;

/// Compute the stable 8-hex-digit fingerprint of a project's absolute path
/// (Glossary: "Project fingerprint"). `h := (h*31 + byte) mod 2^32`, folded
/// as a signed 32-bit accumulator and then taken as its absolute value
/// before hex-encoding.
pub fn project_fingerprint(absolute_path: &Path) -> String {
    let mut h: i32 = 0;
    for byte in absolute_path.to_string_lossy().as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(*byte as i32);
    }
    format!("{:08x}", h.unsigned_abs())
}

/// Resolve the socket path for the global daemon or a project-scoped one.
pub fn socket_path(socket_dir: &Path, project: Option<&Path>) -> PathBuf {
    match project {
        Some(project) => socket_dir.join(format!("project-{}.sock", project_fingerprint(project))),
        None => socket_dir.join("sk.sock"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Request {
    Ping,
    List,
    Exec {
        command: String,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        timeout: Option<u64>,
    },
    Shutdown,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Ping {
        status: &'static str,
        #[serde(rename = "secretsLoaded")]
        secrets_loaded: usize,
    },
    List {
        secrets: Vec<String>,
    },
    Exec {
        #[serde(rename = "exitCode")]
        exit_code: i32,
        stdout: String,
        stderr: String,
        blocked: bool,
        #[serde(rename = "blockReason")]
        block_reason: Option<String>,
    },
    Ack {
        status: &'static str,
    },
    Error {
        error: String,
    },
}

/// The `(secret_map, scrubber)` pair, replaced as a single unit on every
/// rotation reload.
struct Epoch {
    secrets: HashMap<String, String>,
    scrubber: SecretScrubber,
}

impl Epoch {
    fn from_secrets(secrets: HashMap<String, String>) -> Self {
        let scrubber = SecretScrubber::from_secrets(secrets.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Self { secrets, scrubber }
    }
}

impl Drop for Epoch {
    /// Overwrite decrypted plaintext before the map's memory is released,
    /// on both rotation reload and process shutdown (Design Note 9).
    fn drop(&mut self) {
        for value in self.secrets.values_mut() {
            value.zeroize();
        }
    }
}

/// The daemon mediator. Construct with [`Daemon::new`], then drive with
/// [`Daemon::run`].
pub struct Daemon {
    vault: Arc<Vault>,
    policy: Arc<dyn PolicyFilter>,
    epoch: RwLock<Arc<Epoch>>,
    socket_path: PathBuf,
    cwd: PathBuf,
}

impl Daemon {
    pub async fn new(vault: Arc<Vault>, policy: Arc<dyn PolicyFilter>, socket_path: PathBuf, cwd: PathBuf) -> Result<Self> {
        let secrets = vault.get_all_secrets().await?;
        Ok(Self { vault, policy, epoch: RwLock::new(Arc::new(Epoch::from_secrets(secrets))), socket_path, cwd })
    }

    /// Rebuild the secret map and scrubber from the vault and swap them in
    /// as one atomic unit. Called by the rotation scheduler's callback.
    pub async fn reload_secrets(&self) -> Result<()> {
        let secrets = self.vault.get_all_secrets().await?;
        *self.epoch.write().await = Arc::new(Epoch::from_secrets(secrets));
        Ok(())
    }

    /// Bind the socket, removing any stale file at the intended path, and
    /// serve connections until `shutdown` fires. Returns once the listener
    /// is closed.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        if let Some(dir) = self.socket_path.parent() {
            std::fs::create_dir_all(dir)?;
            set_owner_only_dir(dir)?;
        }
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| SecretKeeperError::Storage(format!("failed to bind socket: {e}")))?;
        set_owner_only_file(&self.socket_path)?;

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };
                    let daemon = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = daemon.handle_connection(stream).await {
                            tracing::warn!(error = %err, "connection handling failed");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    async fn handle_connection(&self, mut stream: UnixStream) -> Result<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];

        let request: Request = loop {
            match serde_json::from_slice::<Request>(&buf) {
                Ok(request) => break request,
                Err(err) => {
                    // A buffer that already parses as generic JSON is
                    // complete but carries a shape our schema rejects (e.g.
                    // an unrecognized `action`); that's not truncation, so
                    // respond instead of waiting for more bytes that will
                    // never come.
                    if serde_json::from_slice::<serde_json::Value>(&buf).is_ok() {
                        let response = Response::Error { error: format!("malformed request: {err}") };
                        write_response(&mut stream, &response).await?;
                        return Ok(());
                    }
                }
            }

            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                let response = Response::Error { error: "malformed request: unexpected end of stream".to_string() };
                write_response(&mut stream, &response).await?;
                return Ok(());
            }

            buf.extend_from_slice(&chunk[..n]);
            if buf.len() > MAX_MESSAGE_BYTES {
                let response = Response::Error { error: "request exceeds maximum message size".to_string() };
                write_response(&mut stream, &response).await?;
                return Ok(());
            }
        };

        let response = self.dispatch(request).await;
        write_response(&mut stream, &response).await
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Ping => {
                let secrets_loaded = self.epoch.read().await.secrets.len();
                Response::Ping { status: "ok", secrets_loaded }
            }
            Request::List => {
                let mut secrets: Vec<String> = self.epoch.read().await.secrets.keys().cloned().collect();
                secrets.sort();
                Response::List { secrets }
            }
            Request::Exec { command, cwd, timeout } => self.exec(&command, cwd.as_deref(), timeout).await,
            Request::Shutdown => Response::Ack { status: "shutting down" },
        }
    }

    async fn exec(&self, command: &str, cwd: Option<&str>, timeout_secs: Option<u64>) -> Response {
        if let secret_keeper_domain::PolicyDecision::Blocked(reason) = self.policy.validate(command) {
            return Response::Exec {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("BLOCKED: {reason}"),
                blocked: true,
                block_reason: Some(reason),
            };
        }

        let epoch = Arc::clone(&*self.epoch.read().await);
        let working_dir = cwd.map(PathBuf::from).unwrap_or_else(|| self.cwd.clone());
        let timeout = std::time::Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_EXEC_TIMEOUT_SECS));

        let mut child = match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&working_dir)
            .envs(epoch.secrets.iter())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return Response::Exec {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: epoch.scrubber.scrub(&format!("failed to spawn command: {err}")),
                    blocked: false,
                    block_reason: None,
                }
            }
        };

        let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr is piped");
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        // Read both pipes concurrently with the wait, not after it: a child
        // that fills its pipe buffer before exiting would otherwise block
        // forever with nothing draining it.
        let drain = async {
            let (_, _, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout_buf),
                stderr_pipe.read_to_end(&mut stderr_buf),
                child.wait(),
            );
            status
        };

        let status = match tokio::time::timeout(timeout, drain).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                return Response::Exec {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: epoch.scrubber.scrub(&format!("command failed: {err}")),
                    blocked: false,
                    block_reason: None,
                }
            }
            Err(_) => {
                // Timed out: the child is still running and must be killed
                // before we give up waiting on it (§4.7).
                let _ = child.kill().await;
                return Response::Exec {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: epoch.scrubber.scrub("command timed out"),
                    blocked: false,
                    block_reason: None,
                }
            }
        };

        Response::Exec {
            exit_code: status.code().unwrap_or(1),
            stdout: epoch.scrubber.scrub(&String::from_utf8_lossy(&stdout_buf)),
            stderr: epoch.scrubber.scrub(&String::from_utf8_lossy(&stderr_buf)),
            blocked: false,
            block_reason: None,
        }
    }
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let body = serde_json::to_vec(response)?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_only_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_file(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_file(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_fingerprint_is_stable_across_calls() {
        let path = Path::new("/home/alice/projects/demo");
        assert_eq!(project_fingerprint(path), project_fingerprint(path));
    }

    #[test]
    fn project_fingerprint_is_eight_lowercase_hex_digits() {
        let fingerprint = project_fingerprint(Path::new("/some/project"));
        assert_eq!(fingerprint.len(), 8);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn different_paths_produce_different_fingerprints() {
        let a = project_fingerprint(Path::new("/home/alice/projects/demo"));
        let b = project_fingerprint(Path::new("/home/alice/projects/other"));
        assert_ne!(a, b);
    }

    #[test]
    fn global_socket_is_named_sk_sock() {
        let path = socket_path(Path::new("/tmp/secret-keeper"), None);
        assert_eq!(path, Path::new("/tmp/secret-keeper/sk.sock"));
    }

    #[test]
    fn project_socket_embeds_the_fingerprint() {
        let project = Path::new("/home/alice/demo");
        let path = socket_path(Path::new("/tmp/secret-keeper"), Some(project));
        assert_eq!(path, Path::new("/tmp/secret-keeper").join(format!("project-{}.sock", project_fingerprint(project))));
    }
}
