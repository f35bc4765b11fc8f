// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # secret-keeper
//!
//! A local secret manager whose daemon holds decrypted secrets in memory
//! and mediates command execution so a caller never observes plaintext
//! values directly: commands run with secrets injected as environment
//! variables, and every byte of output is passed through a redaction
//! filter keyed on the loaded secret values.
//!
//! ## Module map
//!
//! - [`crypto`] (C1) — AES-256-GCM + PBKDF2-HMAC-SHA-256.
//! - [`vault`] (C2) — the SQLite-backed encrypted secret store.
//! - [`policy`] (C3) — command allow/deny filter.
//! - [`scrubber`] (C4) — output redaction.
//! - [`rotation_providers`] (C5) — custom/openai/aws/github rotation backends.
//! - [`rotation_manager`] (C6) — rotation orchestration and scheduler.
//! - [`daemon`] (C7) — the IPC mediator.
//! - [`daemon_client`] (C8) — caller-side socket helper.

pub mod crypto;
pub mod daemon;
pub mod daemon_client;
pub mod policy;
pub mod rotation_manager;
pub mod rotation_providers;
pub mod scrubber;
pub mod vault;

pub use crypto::Aes256GcmCrypto;
pub use daemon::{project_fingerprint, socket_path, Daemon};
pub use daemon_client::{resolve_socket_path, DaemonClient};
pub use policy::CommandPolicyFilter;
pub use rotation_manager::{RotationCallback, RotationManager, RotationScheduler, SchedulerState};
pub use rotation_providers::ProviderRegistry;
pub use scrubber::SecretScrubber;
pub use vault::{resolve_vault_path, ImportSummary, Vault};
