// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Primitives (C1)
//!
//! Concrete implementation of [`secret_keeper_domain::CryptoProvider`]:
//! AES-256-GCM authenticated encryption with PBKDF2-HMAC-SHA-256 key
//! derivation.
//!
//! ## Ciphertext layout
//!
//! A base64 blob of `32-byte salt ‖ 12-byte nonce ‖ AEAD-ciphertext-with-tag`.
//! Every encryption draws a fresh salt and nonce; there is no key caching
//! across entries.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::Hmac;
use rand::RngCore;
use secret_keeper_domain::{CryptoProvider, SecretKeeperError};
use sha2::Sha256;
use std::io::Write;
use std::path::Path;

/// Iteration count mandated for PBKDF2-HMAC-SHA-256 key derivation.
pub const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
const MASTER_TOKEN_BYTES: usize = 24;

/// AES-256-GCM + PBKDF2-HMAC-SHA-256 implementation of [`CryptoProvider`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes256GcmCrypto;

impl Aes256GcmCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for Aes256GcmCrypto {
    fn derive_key(&self, key_material: &[u8], salt: &[u8; 32]) -> [u8; 32] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(key_material, salt, PBKDF2_ITERATIONS, &mut key);
        key
    }

    fn encrypt(&self, plaintext: &[u8], key_material: &[u8]) -> Result<String, SecretKeeperError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(key_material, &salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| SecretKeeperError::InvalidKey)?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(blob))
    }

    fn decrypt(&self, blob: &str, key_material: &[u8]) -> Result<Vec<u8>, SecretKeeperError> {
        // Any decode failure, short-length failure, or tag-verification
        // failure collapses to InvalidKey (§4.1) — never a distinguishable
        // error per cause, to avoid an oracle.
        let raw = STANDARD.decode(blob).map_err(|_| SecretKeeperError::InvalidKey)?;

        if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(SecretKeeperError::InvalidKey);
        }

        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let mut salt_array = [0u8; SALT_LEN];
        salt_array.copy_from_slice(salt);
        let key = self.derive_key(key_material, &salt_array);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SecretKeeperError::InvalidKey)
    }

    fn generate_key(&self) -> String {
        let mut bytes = [0u8; MASTER_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    fn secure_erase(&self, path: &Path) -> bool {
        const PASSES: u32 = 3;

        let overwrite = || -> std::io::Result<()> {
            use std::io::Seek;

            let len = std::fs::metadata(path)?.len() as usize;
            let mut file = std::fs::OpenOptions::new().write(true).open(path)?;

            for _ in 0..PASSES {
                let mut buf = vec![0u8; len];
                rand::rng().fill_bytes(&mut buf);
                file.seek(std::io::SeekFrom::Start(0))?;
                file.write_all(&buf)?;
                file.sync_all()?;
            }

            file.seek(std::io::SeekFrom::Start(0))?;
            file.write_all(&vec![0u8; len])?;
            file.sync_all()?;
            Ok(())
        };

        // Best-effort: an overwrite failure still falls back to a plain
        // unlink rather than leaving the file in place.
        let _ = overwrite();
        std::fs::remove_file(path).is_ok()
    }
}

/// Type alias mirroring the teacher's naming of the HMAC instantiation used
/// for key derivation, kept for discoverability at call sites that only
/// import `crypto::HmacSha256`.
pub type HmacSha256 = Hmac<Sha256>;
