//! Domain error taxonomy.
//!
//! One flat, exhaustively-matched enum per the closed-set-variants design
//! note: every failure mode the vault, policy filter, scrubber, and rotation
//! engine can produce is a named variant here, never a boxed `dyn Error`.

use thiserror::Error;

/// The error type returned by every domain operation.
#[derive(Debug, Error, Clone)]
pub enum SecretKeeperError {
    /// Operation attempted on a vault that has never been initialized.
    #[error("vault is not initialized")]
    VaultNotInitialized,

    /// Operation requiring a loaded master key was attempted with none loaded.
    #[error("vault is locked")]
    VaultLocked,

    /// Authentication-tag failure or blob corruption. Deliberately
    /// indistinguishable from a wrong key, to avoid an oracle.
    #[error("invalid key or corrupted secret")]
    InvalidKey,

    /// A secret lookup by name found nothing.
    #[error("secret not found: {0}")]
    SecretNotFound(String),

    /// The daemon's socket is absent or refused the connection.
    #[error("daemon is not running")]
    DaemonNotRunning,

    /// The policy filter rejected a command. Carried as data, not raised
    /// as a failure path by the filter itself — the daemon turns this into
    /// a first-class blocked response, never a propagated error.
    #[error("command blocked: {0}")]
    CommandBlocked(String),

    /// A rotation provider or the rotation manager failed.
    #[error("rotation failed: {0}")]
    RotationError(String),

    /// A secret name failed the `[A-Za-z_][A-Za-z0-9_]*` validation rule.
    #[error("invalid secret name: {0}")]
    InvalidName(String),

    /// An unknown rotation provider tag was requested.
    #[error("unknown rotation provider: {0}")]
    UnknownProvider(String),

    /// Wraps a persistence-layer failure that does not map onto a more
    /// specific variant above.
    #[error("storage error: {0}")]
    Storage(String),

    /// Wraps a filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Wraps a JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for SecretKeeperError {
    fn from(err: std::io::Error) -> Self {
        SecretKeeperError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SecretKeeperError {
    fn from(err: serde_json::Error) -> Self {
        SecretKeeperError::Serialization(err.to_string())
    }
}

/// Convenience alias used throughout the domain and infrastructure layers.
pub type Result<T> = std::result::Result<T, SecretKeeperError>;
