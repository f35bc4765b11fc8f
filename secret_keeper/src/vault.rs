// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Store (C2)
//!
//! Persistent, authenticated-encryption-at-rest storage for secrets, the
//! audit trail, and rotation config/history. Backed by SQLite through
//! `sqlx`, opened in WAL journal mode with full synchronous durability.
//!
//! ## Schema evolution
//!
//! `ensure_schema` is idempotent and safe to run against a vault created by
//! an older build: every table is created with `IF NOT EXISTS`, and columns
//! introduced after the original release (the `sensitivity` column on
//! `secrets`) are added with `ALTER TABLE ... ADD COLUMN` the first time the
//! vault is opened if missing. There is no downgrade path.
//!
//! ## Key handling
//!
//! The vault never persists a password verifier. A loaded key is accepted
//! optimistically; a wrong key only reveals itself the first time it fails
//! to authenticate a stored ciphertext ([`SecretKeeperError::InvalidKey`]).

use chrono::{DateTime, Utc};
use secret_keeper_domain::{
    validate_secret_name, AuditAction, AuditEntry, CryptoProvider, Result, RotationConfig, RotationHistoryEntry, RotationStatus,
    SecretEntry, SecretKeeperError, SecretMetadata, Sensitivity, VaultMetadata,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Directory name housing a vault database, relative to either the home
/// directory or a project root.
const VAULT_DIR_NAME: &str = ".secret-keeper";
const VAULT_FILE_NAME: &str = "secrets.db";

/// Names that mark an environment variable as a secret when imported
/// (§4.2). Matched case-insensitively against substrings of the key.
const SENSITIVE_TOKENS: &[&str] = &[
    "SECRET",
    "KEY",
    "TOKEN",
    "PASSWORD",
    "PASS",
    "PWD",
    "CREDENTIAL",
    "PRIVATE",
    "AUTH",
    "API_KEY",
    "APIKEY",
    "ACCESS_KEY",
    "ACCESSKEY",
    "CLIENT_SECRET",
];

/// Names that mark an environment variable as plain configuration (skipped
/// on import when `secrets_only` is requested).
const CONFIG_TOKENS: &[&str] = &[
    "URL",
    "HOST",
    "PORT",
    "ENDPOINT",
    "DOMAIN",
    "REGION",
    "ZONE",
    "ENV",
    "MODE",
    "DEBUG",
    "LOG",
    "TIMEOUT",
    "USERNAME",
    "USER",
    "EMAIL",
    "ID",
    "PROJECT",
    "BUCKET",
    "DATABASE",
    "DB_NAME",
    "TABLE",
];

fn contains_token(name: &str, tokens: &[&str]) -> bool {
    let upper = name.to_ascii_uppercase();
    tokens.iter().any(|token| upper.contains(token))
}

/// Resolve the vault database path per §4.2's rule: an explicit project
/// path or `force_local` pins the vault to `<cwd or project>/.secret-keeper`;
/// otherwise an existing local vault under the current directory wins; the
/// final fallback is the caller's home directory.
///
/// Returns the resolved path and whether it is project-scoped (as opposed
/// to the global home-directory vault), which callers use to decide whether
/// to seed a `.gitignore`.
pub fn resolve_vault_path(project: Option<&Path>, force_local: bool) -> std::io::Result<(PathBuf, bool)> {
    if let Some(project) = project {
        return Ok((project.join(VAULT_DIR_NAME).join(VAULT_FILE_NAME), true));
    }

    if force_local {
        let cwd = std::env::current_dir()?;
        return Ok((cwd.join(VAULT_DIR_NAME).join(VAULT_FILE_NAME), true));
    }

    let cwd = std::env::current_dir()?;
    let local = cwd.join(VAULT_DIR_NAME).join(VAULT_FILE_NAME);
    if local.exists() {
        return Ok((local, true));
    }

    let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "HOME is not set and no local vault exists")
    })?;
    Ok((home.join(VAULT_DIR_NAME).join(VAULT_FILE_NAME), false))
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

/// Seed a project vault directory with a `.gitignore` excluding everything
/// under it, so a vault never lands in version control by accident.
fn seed_gitignore(vault_dir: &Path) -> std::io::Result<()> {
    let gitignore = vault_dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, "*\n")?;
    }
    Ok(())
}

fn sensitivity_to_str(sensitivity: Sensitivity) -> &'static str {
    match sensitivity {
        Sensitivity::Sensitive => "sensitive",
        Sensitivity::Credential => "credential",
    }
}

fn sensitivity_from_str(raw: &str) -> Sensitivity {
    match raw {
        "credential" => Sensitivity::Credential,
        _ => Sensitivity::Sensitive,
    }
}

fn status_to_str(status: RotationStatus) -> &'static str {
    match status {
        RotationStatus::Success => "success",
        RotationStatus::Failed => "failed",
    }
}

fn status_from_str(raw: &str) -> RotationStatus {
    match raw {
        "success" => RotationStatus::Success,
        _ => RotationStatus::Failed,
    }
}

/// Summary of an `import_from_env` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub secrets: usize,
    pub credentials: usize,
    pub skipped: usize,
}

/// The encrypted-secret, audit, and rotation store for one vault path.
pub struct Vault {
    pool: SqlitePool,
    crypto: Arc<dyn CryptoProvider>,
    key: RwLock<Option<Vec<u8>>>,
}

impl Vault {
    /// Open (creating if absent) the vault database at `path`, applying
    /// directory permissions and schema migration. `is_project` controls
    /// whether a `.gitignore` is seeded alongside the database.
    pub async fn open(path: &Path, is_project: bool, crypto: Arc<dyn CryptoProvider>) -> Result<Self> {
        let dir = path.parent().ok_or_else(|| SecretKeeperError::Storage("vault path has no parent directory".into()))?;
        std::fs::create_dir_all(dir)?;
        set_owner_only_dir(dir)?;
        if is_project {
            seed_gitignore(dir)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| SecretKeeperError::Storage(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| SecretKeeperError::Storage(format!("failed to open vault: {e}")))?;

        let vault = Self { pool, crypto, key: RwLock::new(None) };
        vault.ensure_schema().await?;
        Ok(vault)
    }

    /// Construct a vault directly from an already-open pool (tests, or an
    /// in-memory `sqlite::memory:` database).
    pub async fn from_pool(pool: SqlitePool, crypto: Arc<dyn CryptoProvider>) -> Result<Self> {
        let vault = Self { pool, crypto, key: RwLock::new(None) };
        vault.ensure_schema().await?;
        Ok(vault)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vault_metadata (\
                id INTEGER PRIMARY KEY CHECK (id = 1), \
                created_at TEXT NOT NULL, \
                schema_version TEXT NOT NULL\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS secrets (\
                name TEXT PRIMARY KEY, \
                ciphertext TEXT NOT NULL, \
                created_at TEXT NOT NULL, \
                updated_at TEXT NOT NULL, \
                description TEXT, \
                tags TEXT NOT NULL DEFAULT '[]'\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        // Schema tolerance: vaults created before sensitivity tracking are
        // missing this column entirely. Add it lazily rather than forcing a
        // destructive rebuild.
        let has_sensitivity = sqlx::query("SELECT 1 FROM pragma_table_info('secrets') WHERE name = 'sensitivity'")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .is_some();
        if !has_sensitivity {
            sqlx::query("ALTER TABLE secrets ADD COLUMN sensitivity TEXT NOT NULL DEFAULT 'sensitive'")
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS audit_log (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                timestamp TEXT NOT NULL, \
                action TEXT NOT NULL, \
                secret_name TEXT, \
                detail TEXT\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rotation_config (\
                secret_name TEXT PRIMARY KEY, \
                provider_tag TEXT NOT NULL, \
                schedule_days INTEGER NOT NULL, \
                last_rotated TEXT, \
                next_rotation TEXT, \
                enabled INTEGER NOT NULL, \
                provider_config TEXT NOT NULL\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rotation_history (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                secret_name TEXT NOT NULL, \
                timestamp TEXT NOT NULL, \
                status TEXT NOT NULL, \
                provider_tag TEXT NOT NULL, \
                error_message TEXT\
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn record_audit(&self, action: AuditAction, secret_name: Option<&str>, detail: Option<&str>) -> Result<()> {
        sqlx::query("INSERT INTO audit_log (timestamp, action, secret_name, detail) VALUES (?, ?, ?, ?)")
            .bind(Utc::now().to_rfc3339())
            .bind(action.as_str())
            .bind(secret_name)
            .bind(detail)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM vault_metadata WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.is_some())
    }

    /// Create the vault metadata row and optimistically load `key` for the
    /// current session. No verifier is stored; this cannot fail on a wrong
    /// key by itself.
    pub async fn initialize(&self, key: &[u8]) -> Result<()> {
        if self.is_initialized().await? {
            return Ok(());
        }

        let metadata = VaultMetadata::new(Utc::now());
        sqlx::query("INSERT INTO vault_metadata (id, created_at, schema_version) VALUES (1, ?, ?)")
            .bind(metadata.created_at.to_rfc3339())
            .bind(&metadata.schema_version)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        self.record_audit(AuditAction::VaultInitialized, None, None).await?;
        *self.key.write().await = Some(key.to_vec());
        Ok(())
    }

    /// Load `key` for the current session, validating it against one
    /// existing secret if any are stored. An empty vault accepts any key;
    /// the first real decryption is the actual authority (§4.2).
    pub async fn load_key(&self, key: &[u8]) -> Result<()> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }

        if let Some(row) = sqlx::query("SELECT ciphertext FROM secrets LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
        {
            let ciphertext: String = row.get("ciphertext");
            self.crypto.decrypt(&ciphertext, key)?;
        }

        self.record_audit(AuditAction::VaultUnlocked, None, None).await?;
        *self.key.write().await = Some(key.to_vec());
        Ok(())
    }

    async fn require_key(&self) -> Result<Vec<u8>> {
        self.key.read().await.clone().ok_or(SecretKeeperError::VaultLocked)
    }

    /// Drop the in-memory master key, requiring [`Vault::load_key`] before
    /// any further secret access in this session.
    pub async fn lock(&self) -> Result<()> {
        *self.key.write().await = None;
        self.record_audit(AuditAction::VaultLocked, None, None).await?;
        Ok(())
    }

    /// Decrypt every secret into a name-to-plaintext map for an operator
    /// export, recording the access in the audit trail.
    pub async fn export_all_secrets(&self) -> Result<HashMap<String, String>> {
        let secrets = self.get_all_secrets().await?;
        self.record_audit(AuditAction::SecretsExported, None, Some(&format!("{} secret(s)", secrets.len()))).await?;
        Ok(secrets)
    }

    pub async fn add_secret(
        &self,
        name: &str,
        value: &str,
        description: Option<String>,
        tags: Vec<String>,
        sensitivity: Sensitivity,
    ) -> Result<()> {
        validate_secret_name(name)?;
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }
        let key = self.require_key().await?;
        let ciphertext = self.crypto.encrypt(value.as_bytes(), &key)?;
        let now = Utc::now();

        // Route through `SecretEntry` so its invariants (name validation,
        // `updated_at >= created_at`) govern both the first write and every
        // later overwrite of the same name.
        let entry = match self.fetch_entry(name).await? {
            Some(mut existing) => {
                existing.overwrite(ciphertext, now);
                existing.description = description;
                existing.tags = tags;
                existing.sensitivity = sensitivity;
                existing
            }
            None => SecretEntry::new(name, ciphertext, now, description, tags, sensitivity)?,
        };
        let tags_json = serde_json::to_string(&entry.tags)?;

        sqlx::query(
            "INSERT INTO secrets (name, ciphertext, created_at, updated_at, description, tags, sensitivity) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
                ciphertext = excluded.ciphertext, \
                updated_at = excluded.updated_at, \
                description = excluded.description, \
                tags = excluded.tags, \
                sensitivity = excluded.sensitivity",
        )
        .bind(&entry.name)
        .bind(&entry.ciphertext)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .bind(&entry.description)
        .bind(&tags_json)
        .bind(sensitivity_to_str(entry.sensitivity))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        self.record_audit(AuditAction::SecretAdded, Some(name), None).await?;
        Ok(())
    }

    async fn fetch_entry(&self, name: &str) -> Result<Option<SecretEntry>> {
        let row = sqlx::query("SELECT name, ciphertext, created_at, updated_at, description, tags, sensitivity FROM secrets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(row_to_entry(row)?))
    }

    pub async fn get_secret(&self, name: &str) -> Result<String> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }
        let key = self.require_key().await?;
        let entry = self.fetch_entry(name).await?.ok_or_else(|| SecretKeeperError::SecretNotFound(name.to_string()))?;
        let plaintext = self.crypto.decrypt(&entry.ciphertext, &key)?;
        String::from_utf8(plaintext).map_err(|_| SecretKeeperError::InvalidKey)
    }

    /// Decrypt every stored secret into a name-to-value map, for the
    /// daemon's in-memory secret map and scrubber.
    pub async fn get_all_secrets(&self) -> Result<HashMap<String, String>> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }
        let key = self.require_key().await?;
        let rows = sqlx::query("SELECT name, ciphertext FROM secrets")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("name");
            let ciphertext: String = row.get("ciphertext");
            let plaintext = self.crypto.decrypt(&ciphertext, &key)?;
            let value = String::from_utf8(plaintext).map_err(|_| SecretKeeperError::InvalidKey)?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub async fn list_secrets(&self) -> Result<Vec<SecretMetadata>> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }
        let rows = sqlx::query("SELECT name, created_at, updated_at, description, tags, sensitivity FROM secrets ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(SecretMetadata {
                    name: row.get("name"),
                    created_at: parse_timestamp(row.get("created_at"))?,
                    updated_at: parse_timestamp(row.get("updated_at"))?,
                    description: row.get("description"),
                    tags: serde_json::from_str(&row.get::<String, _>("tags"))?,
                    sensitivity: sensitivity_from_str(&row.get::<String, _>("sensitivity")),
                })
            })
            .collect()
    }

    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }
        let result = sqlx::query("DELETE FROM secrets WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(SecretKeeperError::SecretNotFound(name.to_string()));
        }

        self.record_audit(AuditAction::SecretDeleted, Some(name), None).await?;
        Ok(())
    }

    pub async fn count_secrets(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM secrets").fetch_one(&self.pool).await.map_err(storage_err)?;
        Ok(row.get("n"))
    }

    /// Re-encrypt every secret under `new_key` within one transaction.
    /// If any row fails to decrypt under `old_key`, the transaction is
    /// rolled back and `old_key` remains authoritative (§8 invariant 7).
    pub async fn change_master_key(&self, old_key: &[u8], new_key: &[u8]) -> Result<()> {
        if !self.is_initialized().await? {
            return Err(SecretKeeperError::VaultNotInitialized);
        }

        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let rows = sqlx::query("SELECT name, ciphertext FROM secrets")
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_err)?;

        for row in rows {
            let name: String = row.get("name");
            let ciphertext: String = row.get("ciphertext");
            let plaintext = self.crypto.decrypt(&ciphertext, old_key)?;
            let re_encrypted = self.crypto.encrypt(&plaintext, new_key)?;

            sqlx::query("UPDATE secrets SET ciphertext = ? WHERE name = ?")
                .bind(&re_encrypted)
                .bind(&name)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query("INSERT INTO audit_log (timestamp, action, secret_name, detail) VALUES (?, ?, NULL, NULL)")
            .bind(Utc::now().to_rfc3339())
            .bind(AuditAction::KeyChanged.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        *self.key.write().await = Some(new_key.to_vec());
        Ok(())
    }

    /// Parse `.env`-style `content` and store classified entries. See
    /// §4.2 for the exact token lists and quoting rules.
    pub async fn import_from_env(&self, content: &str, secrets_only: bool) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((raw_name, raw_value)) = trimmed.split_once('=') else { continue };
            let name = raw_name.trim();
            if validate_secret_name(name).is_err() {
                summary.skipped += 1;
                continue;
            }

            let value = strip_matching_quotes(raw_value.trim());

            let is_sensitive = contains_token(name, SENSITIVE_TOKENS);
            let is_config = contains_token(name, CONFIG_TOKENS);

            if !is_sensitive {
                if secrets_only && is_config {
                    summary.skipped += 1;
                    continue;
                }
                // Non-sensitive, non-config names are stored as visible
                // credentials (still encrypted at rest) unless scoped out.
                self.add_secret(name, value, None, vec![], Sensitivity::Credential).await?;
                summary.credentials += 1;
                continue;
            }

            self.add_secret(name, value, None, vec![], Sensitivity::Sensitive).await?;
            summary.secrets += 1;
        }

        Ok(summary)
    }

    // -- Rotation persistence (owned here; orchestrated by the rotation
    // manager in `rotation_manager.rs`) --

    pub async fn upsert_rotation_config(&self, config: &RotationConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO rotation_config (secret_name, provider_tag, schedule_days, last_rotated, next_rotation, enabled, provider_config) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(secret_name) DO UPDATE SET \
                provider_tag = excluded.provider_tag, \
                schedule_days = excluded.schedule_days, \
                last_rotated = excluded.last_rotated, \
                next_rotation = excluded.next_rotation, \
                enabled = excluded.enabled, \
                provider_config = excluded.provider_config",
        )
        .bind(&config.secret_name)
        .bind(&config.provider_tag)
        .bind(config.schedule_days)
        .bind(config.last_rotated.map(|t| t.to_rfc3339()))
        .bind(config.next_rotation.map(|t| t.to_rfc3339()))
        .bind(config.enabled)
        .bind(&config.provider_config)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn get_rotation_config(&self, secret_name: &str) -> Result<Option<RotationConfig>> {
        let row = sqlx::query(
            "SELECT secret_name, provider_tag, schedule_days, last_rotated, next_rotation, enabled, provider_config \
             FROM rotation_config WHERE secret_name = ?",
        )
        .bind(secret_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(row_to_rotation_config).transpose()
    }

    pub async fn list_rotation_configs(&self) -> Result<Vec<RotationConfig>> {
        let rows = sqlx::query(
            "SELECT secret_name, provider_tag, schedule_days, last_rotated, next_rotation, enabled, provider_config \
             FROM rotation_config ORDER BY secret_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(row_to_rotation_config).collect()
    }

    /// Configs due now: `enabled = true ∧ (next_rotation IS NULL ∨ next_rotation ≤ now)`,
    /// ordered by ascending `next_rotation` (nulls — never rotated — first).
    pub async fn due_rotation_configs(&self, now: DateTime<Utc>) -> Result<Vec<RotationConfig>> {
        let rows = sqlx::query(
            "SELECT secret_name, provider_tag, schedule_days, last_rotated, next_rotation, enabled, provider_config \
             FROM rotation_config \
             WHERE enabled = 1 AND (next_rotation IS NULL OR next_rotation <= ?) \
             ORDER BY next_rotation IS NOT NULL, next_rotation ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(row_to_rotation_config).collect()
    }

    pub async fn delete_rotation_config(&self, secret_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM rotation_config WHERE secret_name = ?")
            .bind(secret_name)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn insert_rotation_history(&self, entry: &RotationHistoryEntry) -> Result<()> {
        sqlx::query("INSERT INTO rotation_history (secret_name, timestamp, status, provider_tag, error_message) VALUES (?, ?, ?, ?, ?)")
            .bind(&entry.secret_name)
            .bind(entry.timestamp.to_rfc3339())
            .bind(status_to_str(entry.status))
            .bind(&entry.provider_tag)
            .bind(&entry.error_message)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn list_rotation_history(&self, secret_name: &str) -> Result<Vec<RotationHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, secret_name, timestamp, status, provider_tag, error_message \
             FROM rotation_history WHERE secret_name = ? ORDER BY id DESC",
        )
        .bind(secret_name)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(RotationHistoryEntry {
                    id: row.get("id"),
                    secret_name: row.get("secret_name"),
                    timestamp: parse_timestamp(row.get("timestamp"))?,
                    status: status_from_str(&row.get::<String, _>("status")),
                    provider_tag: row.get("provider_tag"),
                    error_message: row.get("error_message"),
                })
            })
            .collect()
    }
}

fn storage_err(err: sqlx::Error) -> SecretKeeperError {
    SecretKeeperError::Storage(err.to_string())
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SecretKeeperError::Storage(format!("corrupt timestamp '{raw}': {e}")))
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> Result<SecretEntry> {
    Ok(SecretEntry {
        name: row.get("name"),
        ciphertext: row.get("ciphertext"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
        description: row.get("description"),
        tags: serde_json::from_str(&row.get::<String, _>("tags"))?,
        sensitivity: sensitivity_from_str(&row.get::<String, _>("sensitivity")),
    })
}

fn row_to_rotation_config(row: sqlx::sqlite::SqliteRow) -> Result<RotationConfig> {
    Ok(RotationConfig {
        secret_name: row.get("secret_name"),
        provider_tag: row.get("provider_tag"),
        schedule_days: row.get::<i64, _>("schedule_days") as u32,
        last_rotated: row.get::<Option<String>, _>("last_rotated").map(parse_timestamp).transpose()?,
        next_rotation: row.get::<Option<String>, _>("next_rotation").map(parse_timestamp).transpose()?,
        enabled: row.get("enabled"),
        provider_config: row.get("provider_config"),
    })
}

fn strip_matching_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Aes256GcmCrypto;

    async fn open_memory_vault() -> Vault {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Vault::from_pool(pool, Arc::new(Aes256GcmCrypto::new())).await.unwrap()
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let vault = open_memory_vault().await;
        assert!(!vault.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn initialize_then_add_and_get_secret() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("API_KEY", "sk-1234", None, vec![], Sensitivity::Sensitive).await.unwrap();
        let value = vault.get_secret("API_KEY").await.unwrap();
        assert_eq!(value, "sk-1234");
    }

    #[tokio::test]
    async fn operations_on_uninitialized_vault_fail() {
        let vault = open_memory_vault().await;
        let result = vault.add_secret("API_KEY", "x", None, vec![], Sensitivity::Sensitive).await;
        assert!(matches!(result, Err(SecretKeeperError::VaultNotInitialized)));
    }

    #[tokio::test]
    async fn get_secret_without_loaded_key_is_locked() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("API_KEY", "sk-1234", None, vec![], Sensitivity::Sensitive).await.unwrap();

        *vault.key.write().await = None; // simulate a fresh process that never called load_key
        let result = vault.get_secret("API_KEY").await;
        assert!(matches!(result, Err(SecretKeeperError::VaultLocked)));
    }

    #[tokio::test]
    async fn missing_secret_errors() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        let result = vault.get_secret("NOPE").await;
        assert!(matches!(result, Err(SecretKeeperError::SecretNotFound(_))));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("API_KEY", "sk-1234", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.delete_secret("API_KEY").await.unwrap();
        assert!(matches!(vault.get_secret("API_KEY").await, Err(SecretKeeperError::SecretNotFound(_))));
    }

    #[tokio::test]
    async fn list_secrets_never_carries_ciphertext_or_plaintext() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("API_KEY", "sk-1234", Some("desc".into()), vec!["prod".into()], Sensitivity::Sensitive).await.unwrap();
        let listed = vault.list_secrets().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "API_KEY");
        assert_eq!(listed[0].tags, vec!["prod".to_string()]);
    }

    #[tokio::test]
    async fn count_secrets_reflects_additions_and_deletions() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("A", "1", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.add_secret("B", "2", None, vec![], Sensitivity::Sensitive).await.unwrap();
        assert_eq!(vault.count_secrets().await.unwrap(), 2);
        vault.delete_secret("A").await.unwrap();
        assert_eq!(vault.count_secrets().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn change_master_key_reencrypts_all_rows() {
        let vault = open_memory_vault().await;
        vault.initialize(b"old-key").await.unwrap();
        vault.add_secret("A", "value-a", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.add_secret("B", "value-b", None, vec![], Sensitivity::Sensitive).await.unwrap();

        vault.change_master_key(b"old-key", b"new-key").await.unwrap();

        assert_eq!(vault.get_secret("A").await.unwrap(), "value-a");
        assert_eq!(vault.get_secret("B").await.unwrap(), "value-b");
    }

    #[tokio::test]
    async fn change_master_key_with_wrong_old_key_leaves_vault_untouched() {
        let vault = open_memory_vault().await;
        vault.initialize(b"old-key").await.unwrap();
        vault.add_secret("A", "value-a", None, vec![], Sensitivity::Sensitive).await.unwrap();

        let result = vault.change_master_key(b"wrong-key", b"new-key").await;
        assert!(result.is_err());

        // Old key still decrypts everything (§8 invariant 7).
        assert_eq!(vault.get_secret("A").await.unwrap(), "value-a");
    }

    #[tokio::test]
    async fn import_from_env_classifies_entries() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();

        let content = "# comment\n\nAPI_KEY=abc123\nDATABASE_URL=postgres://u:p@h/d\nAPP_NAME=\"my app\"\n";
        let summary = vault.import_from_env(content, false).await.unwrap();

        assert_eq!(summary.secrets, 1); // API_KEY only; DATABASE_URL/APP_NAME carry no sensitive token
        assert_eq!(summary.credentials, 2);
        assert_eq!(vault.get_secret("APP_NAME").await.unwrap(), "my app");
        assert_eq!(vault.get_secret("DATABASE_URL").await.unwrap(), "postgres://u:p@h/d");
    }

    #[tokio::test]
    async fn import_from_env_secrets_only_skips_config_names() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();

        let content = "API_KEY=abc123\nHOST=localhost\n";
        let summary = vault.import_from_env(content, true).await.unwrap();

        assert_eq!(summary.secrets, 1);
        assert_eq!(summary.skipped, 1);
        assert!(matches!(vault.get_secret("HOST").await, Err(SecretKeeperError::SecretNotFound(_))));
    }

    #[tokio::test]
    async fn import_strips_matching_quotes_but_not_mismatched_ones() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        let content = "TOKEN='single'\nMIXED=\"unterminated\n";
        vault.import_from_env(content, false).await.unwrap();
        assert_eq!(vault.get_secret("TOKEN").await.unwrap(), "single");
        assert_eq!(vault.get_secret("MIXED").await.unwrap(), "\"unterminated");
    }

    #[tokio::test]
    async fn lock_clears_the_key_and_requires_reload() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("A", "value-a", None, vec![], Sensitivity::Sensitive).await.unwrap();

        vault.lock().await.unwrap();
        assert!(matches!(vault.get_secret("A").await, Err(SecretKeeperError::VaultLocked)));

        vault.load_key(b"master-key").await.unwrap();
        assert_eq!(vault.get_secret("A").await.unwrap(), "value-a");
    }

    #[tokio::test]
    async fn export_all_secrets_returns_every_plaintext_value() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("A", "value-a", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.add_secret("B", "value-b", None, vec![], Sensitivity::Sensitive).await.unwrap();

        let exported = vault.export_all_secrets().await.unwrap();
        assert_eq!(exported.get("A").map(String::as_str), Some("value-a"));
        assert_eq!(exported.get("B").map(String::as_str), Some("value-b"));
    }

    #[tokio::test]
    async fn overwriting_a_secret_keeps_its_original_created_at() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("A", "first", None, vec![], Sensitivity::Sensitive).await.unwrap();
        let first_listing = vault.list_secrets().await.unwrap();
        let created_at = first_listing[0].created_at;

        vault.add_secret("A", "second", None, vec![], Sensitivity::Sensitive).await.unwrap();
        assert_eq!(vault.get_secret("A").await.unwrap(), "second");
        let second_listing = vault.list_secrets().await.unwrap();
        assert_eq!(second_listing[0].created_at, created_at);
    }

    #[tokio::test]
    async fn due_rotation_configs_honors_enabled_and_next_rotation() {
        let vault = open_memory_vault().await;
        vault.initialize(b"master-key").await.unwrap();
        vault.add_secret("A", "1", None, vec![], Sensitivity::Sensitive).await.unwrap();

        let never_rotated = RotationConfig::new("A", "custom", 30, "{}");
        vault.upsert_rotation_config(&never_rotated).await.unwrap();

        let due = vault.due_rotation_configs(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].secret_name, "A");

        let mut disabled = never_rotated.clone();
        disabled.enabled = false;
        vault.upsert_rotation_config(&disabled).await.unwrap();
        assert!(vault.due_rotation_configs(Utc::now()).await.unwrap().is_empty());
    }

    #[test]
    fn resolve_vault_path_prefers_explicit_project() {
        let (path, is_project) = resolve_vault_path(Some(Path::new("/tmp/proj")), false).unwrap();
        assert_eq!(path, Path::new("/tmp/proj/.secret-keeper/secrets.db"));
        assert!(is_project);
    }

    #[test]
    fn strip_matching_quotes_handles_both_styles() {
        assert_eq!(strip_matching_quotes("\"a b\""), "a b");
        assert_eq!(strip_matching_quotes("'a b'"), "a b");
        assert_eq!(strip_matching_quotes("a b"), "a b");
    }
}
