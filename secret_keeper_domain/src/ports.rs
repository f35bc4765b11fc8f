//! Trait contracts (ports) implemented by the infrastructure layer.
//!
//! The domain crate defines *what* these collaborators must do; concrete,
//! I/O-bound implementations live in `secret_keeper`. Keeping the contracts
//! here means the daemon mediator can be tested against fakes without
//! pulling in `aes-gcm`, `sqlx`, or a real shell.

use crate::error::Result;
use crate::rotation::RotationConfig;
use async_trait::async_trait;

/// C1 — authenticated symmetric encryption and key derivation.
///
/// Implementations must treat any tag-verification failure, any
/// too-short blob, and any base64 decode failure as the single
/// `SecretKeeperError::InvalidKey` outcome (§4.1) — never a distinguishable
/// error per cause.
pub trait CryptoProvider: Send + Sync {
    /// Derive a 32-byte symmetric key from key material and a salt.
    fn derive_key(&self, key_material: &[u8], salt: &[u8; 32]) -> [u8; 32];

    /// Encrypt `plaintext` under `key`, returning a base64 blob of
    /// `salt ‖ nonce ‖ ciphertext+tag`.
    fn encrypt(&self, plaintext: &[u8], key_material: &[u8]) -> Result<String>;

    /// Decrypt a base64 blob produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, blob: &str, key_material: &[u8]) -> Result<Vec<u8>>;

    /// Generate a new 24-byte random master token, URL-safe base64 encoded.
    fn generate_key(&self) -> String;

    /// Best-effort secure erase of a file: overwrite then unlink.
    /// Returns `true` iff every overwrite pass succeeded before unlink.
    fn secure_erase(&self, path: &std::path::Path) -> bool;
}

/// Outcome of a policy decision (§4.3). Carried as data, never as an error —
/// the filter itself never raises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Blocked(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }
}

/// C3 — per-command allow/deny decision.
pub trait PolicyFilter: Send + Sync {
    fn validate(&self, command: &str) -> PolicyDecision;
}

/// C4 — byte-level replacement of secret values (and common encodings)
/// with opaque markers.
pub trait OutputScrubber: Send + Sync {
    fn scrub(&self, text: &str) -> String;
}

/// C5 — uniform contract over heterogeneous rotation back-ends.
#[async_trait]
pub trait RotationProvider: Send + Sync {
    /// Stable tag used as the foreign key in [`RotationConfig::provider_tag`].
    fn provider_tag(&self) -> &'static str;

    /// Human-readable name for listings.
    fn display_name(&self) -> &'static str;

    /// Produce a new secret value, replacing `current_value`.
    async fn rotate(&self, config: &RotationConfig, current_value: &str) -> Result<String>;

    /// Structural validation of the provider-specific configuration blob,
    /// without making any network or process call.
    fn validate_config(&self, config: &RotationConfig) -> bool;

    /// Dry-run check: never mutates the stored secret.
    async fn test_rotate(&self, config: &RotationConfig, current_value: &str) -> Result<bool>;
}
