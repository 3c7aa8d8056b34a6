//! X25519 Elliptic-Curve Diffie-Hellman key agreement.
//!
//! Provides ephemeral and static key agreement for deriving shared
//! secrets, plus conversion from Ed25519 keys to X25519 keys
//! (RFC 7748 compatible). The key-exchange protocol wraps a channel
//! group key for a recipient known only by their Ed25519 public key,
//! so both directions of conversion are needed:
//!
//! - secret side: `SHA-512(seed)` lower 32 bytes → X25519 secret,
//! - public side: Edwards point → Montgomery form.
//!
//! Both sides land on the same curve point, so
//! `X25519(eph_secret, montgomery(recipient_pub))` on the sender equals
//! `X25519(recipient_secret, eph_pub)` on the recipient.

use ordernet_types::{OrdernetError, Result};

use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::signing::{Keypair, PublicKey};

// ---------------------------------------------------------------------------
// X25519PublicKey
// ---------------------------------------------------------------------------

/// X25519 public key (32 bytes, Montgomery form) for key agreement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct X25519PublicKey(x25519_dalek::PublicKey);

impl X25519PublicKey {
    /// Creates an [`X25519PublicKey`] from raw 32-byte Montgomery-form
    /// representation.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    /// Returns the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

// ---------------------------------------------------------------------------
// X25519StaticSecret
// ---------------------------------------------------------------------------

/// Long-lived X25519 secret key.
///
/// Used for the Ed25519-to-X25519 conversion path. The underlying
/// `x25519-dalek` [`StaticSecret`](x25519_dalek::StaticSecret) zeroizes
/// its memory on drop.
pub struct X25519StaticSecret(x25519_dalek::StaticSecret);

impl X25519StaticSecret {
    /// Derives the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }
}

// X25519StaticSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// X25519EphemeralSecret
// ---------------------------------------------------------------------------

/// Single-use ephemeral X25519 secret key.
///
/// Generated per key-exchange message, used for one ECDH, then
/// discarded. Consumed on use.
pub struct X25519EphemeralSecret {
    /// Stored as [`StaticSecret`](x25519_dalek::StaticSecret) because
    /// `x25519_dalek::EphemeralSecret` is consumed on `diffie_hellman`
    /// and the public key must be extracted *before* performing ECDH.
    inner: x25519_dalek::StaticSecret,
}

impl X25519EphemeralSecret {
    /// Generates a fresh ephemeral secret from OS entropy.
    pub fn generate() -> Self {
        let inner = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        Self { inner }
    }

    /// Returns the public key corresponding to this ephemeral secret.
    ///
    /// The caller must send this public key to the recipient so they
    /// can derive the same shared secret.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(x25519_dalek::PublicKey::from(&self.inner))
    }
}

// X25519EphemeralSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// Shared secret derived from an X25519 Diffie-Hellman exchange (32 bytes).
///
/// Automatically zeroized on drop. Should be passed to an HKDF rather
/// than used directly as keying material.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Returns the raw 32-byte shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// SharedSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// ECDH functions
// ---------------------------------------------------------------------------

/// Performs X25519 ECDH with a static (long-lived) secret key.
///
/// Computes the shared secret between `our_secret` and `their_public`.
/// Both parties performing this operation with the other's public key
/// derive the identical shared secret.
pub fn ecdh_derive_shared(
    our_secret: &X25519StaticSecret,
    their_public: &X25519PublicKey,
) -> SharedSecret {
    let raw = our_secret.0.diffie_hellman(&their_public.0);
    SharedSecret(*raw.as_bytes())
}

/// Performs X25519 ECDH with an ephemeral (single-use) secret key.
///
/// The ephemeral secret is consumed and cannot be reused.
pub fn ecdh_derive_shared_ephemeral(
    our_secret: X25519EphemeralSecret,
    their_public: &X25519PublicKey,
) -> SharedSecret {
    let raw = our_secret.inner.diffie_hellman(&their_public.0);
    SharedSecret(*raw.as_bytes())
}

// ---------------------------------------------------------------------------
// Ed25519 → X25519 conversion
// ---------------------------------------------------------------------------

/// Converts an Ed25519 signing keypair to an X25519 static secret and
/// public key pair.
///
/// Process (RFC 7748 / RFC 8032 compatible):
/// 1. `SHA-512(ed25519_seed)` → 64 bytes
/// 2. Take lower 32 bytes → X25519 secret (clamping done internally by
///    `x25519-dalek`)
/// 3. Derive X25519 public key from the secret
///
/// Intermediate values are zeroized before returning.
pub fn ed25519_to_x25519(
    keypair: &Keypair,
) -> Result<(X25519StaticSecret, X25519PublicKey)> {
    let mut seed = keypair.signing_key.to_bytes();
    let hash_output = Sha512::digest(seed);
    seed.zeroize();

    let mut hash_bytes = [0u8; 64];
    hash_bytes.copy_from_slice(&hash_output);

    let mut secret_bytes = [0u8; 32];
    secret_bytes.copy_from_slice(&hash_bytes[..32]);
    hash_bytes.zeroize();

    let static_secret = x25519_dalek::StaticSecret::from(secret_bytes);
    secret_bytes.zeroize();

    let public_key = x25519_dalek::PublicKey::from(&static_secret);

    Ok((
        X25519StaticSecret(static_secret),
        X25519PublicKey(public_key),
    ))
}

/// Converts an Ed25519 *public* key to its X25519 (Montgomery form)
/// counterpart without access to the secret half.
///
/// The Edwards point is decompressed and mapped to the Montgomery
/// u-coordinate. The result matches the public key produced by
/// [`ed25519_to_x25519`] for the same identity, which is what makes
/// sender-side key wrapping possible.
///
/// # Errors
///
/// Returns [`OrdernetError::CryptoError`] if the bytes are not a valid
/// Edwards point.
pub fn ed25519_public_to_x25519(public_key: &PublicKey) -> Result<X25519PublicKey> {
    let vk = VerifyingKey::from_bytes(public_key.as_bytes()).map_err(|e| {
        OrdernetError::CryptoError {
            reason: format!("invalid Ed25519 public key: {e}"),
        }
    })?;
    let montgomery = vk.to_montgomery();
    Ok(X25519PublicKey::from_bytes(montgomery.to_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
