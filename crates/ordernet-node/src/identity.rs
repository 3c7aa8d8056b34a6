//! Node identity: the long-term Ed25519 keypair, encrypted at rest.
//!
//! On start, an existing identity row is decrypted with
//! `Argon2id(passphrase, salt)` and XChaCha20-Poly1305; if none exists,
//! a fresh keypair is generated and sealed with a freshly sampled
//! salt + nonce. A passphrase that cannot open the stored row is
//! [`OrdernetError::IdentityLocked`], fatal at start.

use ordernet_crypto::aead::{self, AeadNonce};
use ordernet_crypto::kdf;
use ordernet_crypto::signing::{fingerprint, Keypair, PublicKey};
use ordernet_store::{Database, IdentityRow};
use ordernet_types::{OrdernetError, Result};
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// IdentityManager
// ---------------------------------------------------------------------------

/// The node's long-term identity: keypair plus mutable nickname.
pub struct IdentityManager {
    keypair: Keypair,
    nickname: String,
}

impl IdentityManager {
    /// Loads the stored identity or creates a fresh one.
    ///
    /// # Parameters
    ///
    /// - `store` — opened database.
    /// - `passphrase` — the effective passphrase (the caller resolves
    ///   the `"ordernet-default"` fallback).
    /// - `initial_nickname` — nickname for a *newly created* identity;
    ///   ignored when a row already exists.
    ///
    /// # Errors
    ///
    /// - [`OrdernetError::IdentityLocked`] if the stored private key
    ///   does not decrypt under `passphrase`.
    /// - [`OrdernetError::StorageError`] on database failures.
    pub fn load_or_create(
        store: &Database,
        passphrase: &str,
        initial_nickname: Option<&str>,
    ) -> Result<Self> {
        match store.get_identity()? {
            Some(row) => Self::unlock(row, passphrase),
            None => Self::create(store, passphrase, initial_nickname),
        }
    }

    /// Decrypts an existing identity row.
    fn unlock(row: IdentityRow, passphrase: &str) -> Result<Self> {
        let key = kdf::derive_key(passphrase.as_bytes(), &row.salt)?;
        let nonce = AeadNonce::from_bytes(row.nonce);

        let mut seed_bytes = aead::decrypt(key.as_bytes(), &nonce, &row.private_key_enc, &[])
            .map_err(|_| OrdernetError::IdentityLocked)?;

        if seed_bytes.len() != 32 {
            seed_bytes.zeroize();
            return Err(OrdernetError::IdentityLocked);
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&seed_bytes);
        seed_bytes.zeroize();

        let keypair = Keypair::from_seed(&seed);
        seed.zeroize();

        if keypair.public_key().as_bytes() != &row.public_key {
            return Err(OrdernetError::StorageError {
                reason: "stored public key does not match decrypted private key".into(),
            });
        }

        tracing::info!(
            fingerprint = %fingerprint(&keypair.public_key()),
            nickname = %row.nickname,
            "identity unlocked"
        );

        Ok(Self {
            keypair,
            nickname: row.nickname,
        })
    }

    /// Generates, seals, and stores a fresh identity.
    fn create(
        store: &Database,
        passphrase: &str,
        initial_nickname: Option<&str>,
    ) -> Result<Self> {
        let keypair = Keypair::generate();
        let public_key = keypair.public_key();

        let nickname = initial_nickname
            .map(str::to_string)
            .unwrap_or_else(|| format!("anon-{}", &public_key.to_hex()[..8]));

        let salt = kdf::generate_salt();
        let key = kdf::derive_key(passphrase.as_bytes(), &salt)?;
        let nonce = aead::generate_aead_nonce();

        let mut seed = keypair.seed_bytes();
        let private_key_enc = aead::encrypt(key.as_bytes(), &nonce, &seed, &[])?;
        seed.zeroize();

        store.insert_identity(&IdentityRow {
            public_key: *public_key.as_bytes(),
            private_key_enc,
            salt,
            nonce: *nonce.as_bytes(),
            nickname: nickname.clone(),
        })?;

        tracing::info!(
            fingerprint = %fingerprint(&public_key),
            %nickname,
            "new identity created"
        );

        Ok(Self { keypair, nickname })
    }

    /// Returns the signing keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Returns the public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Returns the lowercase hex of the public key.
    pub fn public_hex(&self) -> String {
        self.keypair.public_key().to_hex()
    }

    /// Returns the short fingerprint of the public key.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.keypair.public_key())
    }

    /// Returns the current nickname.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Updates the nickname in memory and in the store.
    pub fn set_nickname(&mut self, store: &Database, nickname: &str) -> Result<()> {
        store.update_identity_nickname(nickname)?;
        self.nickname = nickname.to_string();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
