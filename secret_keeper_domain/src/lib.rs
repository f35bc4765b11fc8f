// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Layer
//!
//! Pure, synchronous business types for the secret-keeper vault: the
//! data-model entities (secret entries, vault metadata, audit log, rotation
//! config/history), the domain error taxonomy, and the trait contracts
//! (ports) that the infrastructure layer implements for crypto, the policy
//! filter, the output scrubber, and rotation providers.
//!
//! This crate has no I/O and no async runtime dependency of its own beyond
//! the `async_trait` macro used to express the [`ports::RotationProvider`]
//! contract, which is inherently asynchronous in any real implementation.

pub mod audit;
pub mod error;
pub mod ports;
pub mod rotation;
pub mod secret;
pub mod vault_metadata;

pub use audit::{AuditAction, AuditEntry};
pub use error::{Result, SecretKeeperError};
pub use ports::{CryptoProvider, OutputScrubber, PolicyDecision, PolicyFilter, RotationProvider};
pub use rotation::{RotationConfig, RotationHistoryEntry, RotationStatus};
pub use secret::{validate_secret_name, SecretEntry, SecretMetadata, Sensitivity};
pub use vault_metadata::VaultMetadata;
