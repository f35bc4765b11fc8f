//! Audit log entity: an append-only trail of vault lifecycle actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of auditable actions. New variants require an explicit,
/// exhaustively-matched addition everywhere this type is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    VaultInitialized,
    VaultUnlocked,
    VaultLocked,
    SecretAdded,
    SecretDeleted,
    SecretsExported,
    KeyChanged,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::VaultInitialized => "vault_initialized",
            AuditAction::VaultUnlocked => "vault_unlocked",
            AuditAction::VaultLocked => "vault_locked",
            AuditAction::SecretAdded => "secret_added",
            AuditAction::SecretDeleted => "secret_deleted",
            AuditAction::SecretsExported => "secrets_exported",
            AuditAction::KeyChanged => "key_changed",
        }
    }
}

/// One append-only audit row. Never mutated or pruned by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub secret_name: Option<String>,
    pub detail: Option<String>,
}

impl AuditEntry {
    /// Build a new entry for insertion; `id` is assigned by the store.
    pub fn pending(action: AuditAction, timestamp: DateTime<Utc>, secret_name: Option<String>, detail: Option<String>) -> Self {
        Self {
            id: 0,
            timestamp,
            action,
            secret_name,
            detail,
        }
    }
}
