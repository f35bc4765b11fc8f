// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Vault-plus-crypto round trip against a real on-disk SQLite file,
//! exercising persistence and master-key rotation across a simulated
//! process restart (a fresh [`Vault`] re-opened over the same file).

use secret_keeper::crypto::Aes256GcmCrypto;
use secret_keeper::vault::Vault;
use secret_keeper_domain::{SecretKeeperError, Sensitivity};
use std::sync::Arc;

#[tokio::test]
async fn secret_survives_a_reopen_of_the_same_vault_file() {
    let dir = tempfile::tempdir().unwrap();
    let vault_path = dir.path().join(".secret-keeper").join("secrets.db");

    {
        let vault = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
        vault.initialize(b"restart-key").await.unwrap();
        vault
            .add_secret("DB_PASSWORD", "correct horse battery staple", None, vec!["infra".to_string()], Sensitivity::Sensitive)
            .await
            .unwrap();
    }

    let reopened = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
    reopened.load_key(b"restart-key").await.unwrap();
    assert_eq!(reopened.get_secret("DB_PASSWORD").await.unwrap(), "correct horse battery staple");

    let metadata = reopened.list_secrets().await.unwrap();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].tags, vec!["infra".to_string()]);
}

#[tokio::test]
async fn wrong_key_after_reopen_fails_indistinguishably() {
    let dir = tempfile::tempdir().unwrap();
    let vault_path = dir.path().join(".secret-keeper").join("secrets.db");

    {
        let vault = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
        vault.initialize(b"the-real-key").await.unwrap();
        vault.add_secret("TOKEN", "value", None, vec![], Sensitivity::Sensitive).await.unwrap();
    }

    let reopened = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
    reopened.load_key(b"wrong-key").await.unwrap();
    let result = reopened.get_secret("TOKEN").await;
    assert!(matches!(result, Err(SecretKeeperError::InvalidKey)));
}

#[tokio::test]
async fn change_master_key_round_trips_through_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let vault_path = dir.path().join(".secret-keeper").join("secrets.db");

    {
        let vault = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
        vault.initialize(b"old-key").await.unwrap();
        vault.add_secret("A", "first", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.add_secret("B", "second", None, vec![], Sensitivity::Sensitive).await.unwrap();
        vault.change_master_key(b"old-key", b"new-key").await.unwrap();
    }

    let reopened = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
    reopened.load_key(b"new-key").await.unwrap();
    assert_eq!(reopened.get_secret("A").await.unwrap(), "first");
    assert_eq!(reopened.get_secret("B").await.unwrap(), "second");

    let stale = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
    stale.load_key(b"old-key").await.unwrap();
    assert!(matches!(stale.get_secret("A").await, Err(SecretKeeperError::InvalidKey)));
}

#[tokio::test]
async fn env_import_round_trips_secrets_and_credentials_through_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let vault_path = dir.path().join(".secret-keeper").join("secrets.db");
    let env_contents = "API_KEY=abc123\nAPP_NAME=demo\nDATABASE_URL=postgres://u:p@h/d\n";

    {
        let vault = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
        vault.initialize(b"env-import-key").await.unwrap();
        let summary = vault.import_from_env(env_contents, false).await.unwrap();
        assert_eq!(summary.secrets, 1);
        assert_eq!(summary.credentials, 2);
    }

    let reopened = Vault::open(&vault_path, true, Arc::new(Aes256GcmCrypto::new())).await.unwrap();
    reopened.load_key(b"env-import-key").await.unwrap();
    assert_eq!(reopened.get_secret("API_KEY").await.unwrap(), "abc123");
    assert_eq!(reopened.get_secret("DATABASE_URL").await.unwrap(), "postgres://u:p@h/d");
}
