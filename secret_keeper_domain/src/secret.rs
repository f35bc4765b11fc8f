//! Secret entry: the vault's primary entity.

use crate::error::{Result, SecretKeeperError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern is valid"))
}

/// Validate a secret name against `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(SecretKeeperError::InvalidName(name.to_string()))
    }
}

/// Whether a secret's value must be masked in listings.
///
/// `Sensitive` values are never shown, even redacted, in a listing.
/// `Credential` values are visible in listings (e.g. a username) but are
/// still stored encrypted like any other secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Sensitive,
    Credential,
}

impl Default for Sensitivity {
    /// Legacy rows with no recorded sensitivity default to the safer value.
    fn default() -> Self {
        Sensitivity::Sensitive
    }
}

/// A stored secret, identified by name.
///
/// `ciphertext` is the opaque base64 blob described by the vault's
/// ciphertext layout (salt ‖ nonce ‖ AEAD ciphertext+tag); this type never
/// carries plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    pub name: String,
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub sensitivity: Sensitivity,
}

impl SecretEntry {
    /// Construct a new entry with matching created/updated timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`SecretKeeperError::InvalidName`] if `name` does not match
    /// `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn new(
        name: impl Into<String>,
        ciphertext: impl Into<String>,
        now: DateTime<Utc>,
        description: Option<String>,
        tags: Vec<String>,
        sensitivity: Sensitivity,
    ) -> Result<Self> {
        let name = name.into();
        validate_secret_name(&name)?;

        Ok(Self {
            name,
            ciphertext: ciphertext.into(),
            created_at: now,
            updated_at: now,
            description,
            tags,
            sensitivity,
        })
    }

    /// Replace the ciphertext in place, bumping `updated_at`.
    ///
    /// # Invariant
    ///
    /// `updated_at >= created_at` always holds after this call.
    pub fn overwrite(&mut self, ciphertext: impl Into<String>, now: DateTime<Utc>) {
        self.ciphertext = ciphertext.into();
        self.updated_at = now.max(self.created_at);
    }
}

/// A listing-safe view of a secret: never includes ciphertext or plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretMetadata {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub sensitivity: Sensitivity,
}

impl From<&SecretEntry> for SecretMetadata {
    fn from(entry: &SecretEntry) -> Self {
        Self {
            name: entry.name.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            description: entry.description.clone(),
            tags: entry.tags.clone(),
            sensitivity: entry.sensitivity,
        }
    }
}
