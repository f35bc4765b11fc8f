// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Daemon Client (C8)
//!
//! Caller-side helper for resolving the correct socket and performing a
//! one-shot connect-send-receive round trip.

use crate::daemon::socket_path;
use secret_keeper_domain::{Result, SecretKeeperError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolve the socket the caller should talk to: project-specific if a
/// local vault exists at `cwd`, else global (§4.8).
pub fn resolve_socket_path(socket_dir: &Path, cwd: &Path) -> PathBuf {
    let local_vault = cwd.join(".secret-keeper").join("secrets.db");
    if local_vault.exists() {
        socket_path(socket_dir, Some(cwd))
    } else {
        socket_path(socket_dir, None)
    }
}

/// Thin client over the daemon's Unix-socket IPC.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Send one JSON request and return the single JSON response. A
    /// missing socket or a refused connection surfaces as
    /// [`SecretKeeperError::DaemonNotRunning`].
    pub async fn send(&self, request: Value) -> Result<Value> {
        let connect = tokio::time::timeout(DEFAULT_CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path)).await;
        let mut stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(_)) | Err(_) => return Err(SecretKeeperError::DaemonNotRunning),
        };

        let body = serde_json::to_vec(&request)?;
        stream.write_all(&body).await.map_err(|_| SecretKeeperError::DaemonNotRunning)?;
        stream.shutdown().await.ok();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.map_err(|_| SecretKeeperError::DaemonNotRunning)?;

        if buf.is_empty() {
            return Err(SecretKeeperError::DaemonNotRunning);
        }

        serde_json::from_slice(&buf).map_err(|e| SecretKeeperError::Io(format!("malformed daemon response: {e}")))
    }

    pub async fn ping(&self) -> Result<Value> {
        self.send(serde_json::json!({"action": "ping"})).await
    }

    pub async fn list(&self) -> Result<Value> {
        self.send(serde_json::json!({"action": "list"})).await
    }

    pub async fn exec(&self, command: &str, cwd: Option<&str>, timeout: Option<u64>) -> Result<Value> {
        self.send(serde_json::json!({"action": "exec", "command": command, "cwd": cwd, "timeout": timeout})).await
    }

    pub async fn shutdown(&self) -> Result<Value> {
        self.send(serde_json::json!({"action": "shutdown"})).await
    }

    /// `socket-file existence plus a successful ping` is the client's
    /// definition of "running" (§4.7).
    pub async fn is_running(&self) -> bool {
        self.socket_path.exists() && self.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_socket_reports_daemon_not_running() {
        let client = DaemonClient::new(PathBuf::from("/tmp/secret-keeper-tests-missing.sock"));
        let result = client.ping().await;
        assert!(matches!(result, Err(SecretKeeperError::DaemonNotRunning)));
        assert!(!client.is_running().await);
    }

    #[test]
    fn resolve_socket_path_falls_back_to_global_without_local_vault() {
        let dir = tempfile::tempdir().unwrap();
        let socket_dir = Path::new("/tmp/secret-keeper");
        let resolved = resolve_socket_path(socket_dir, dir.path());
        assert_eq!(resolved, socket_path(socket_dir, None));
    }

    #[test]
    fn resolve_socket_path_prefers_project_socket_when_local_vault_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".secret-keeper")).unwrap();
        std::fs::write(dir.path().join(".secret-keeper").join("secrets.db"), b"").unwrap();

        let socket_dir = Path::new("/tmp/secret-keeper");
        let resolved = resolve_socket_path(socket_dir, dir.path());
        assert_eq!(resolved, socket_path(socket_dir, Some(dir.path())));
    }
}
