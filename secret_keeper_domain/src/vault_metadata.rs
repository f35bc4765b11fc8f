//! Vault metadata: the small key/value table carrying schema version and
//! creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version written by `initialize`.
pub const CURRENT_SCHEMA_VERSION: &str = "2";

/// Legacy schema version that carried a password-verifier hash, now ignored.
pub const LEGACY_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultMetadata {
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
}

impl VaultMetadata {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
        }
    }

    /// Whether this vault predates the sensitivity column and the removal
    /// of the password-verifier hash.
    pub fn is_legacy(&self) -> bool {
        self.schema_version == LEGACY_SCHEMA_VERSION
    }
}
