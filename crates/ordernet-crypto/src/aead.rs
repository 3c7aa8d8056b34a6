//! XChaCha20-Poly1305 authenticated encryption.
//!
//! All symmetric encryption in OrderNet (chat payloads, wrapped group
//! keys, the identity seed at rest) uses XChaCha20-Poly1305 with
//! 192-bit (24-byte) nonces. Nonces are generated from OS entropy and
//! **must never be reused** with the same key.

use ordernet_types::{OrdernetError, Result};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

// ---------------------------------------------------------------------------
// AeadNonce
// ---------------------------------------------------------------------------

/// 192-bit (24-byte) nonce for XChaCha20-Poly1305.
///
/// Must be unique per encryption operation. Serializes on the wire as
/// a JSON array of 24 integers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AeadNonce([u8; 24]);

impl AeadNonce {
    /// Fixed byte length of an XChaCha20-Poly1305 nonce.
    pub const LEN: usize = 24;

    /// Creates an [`AeadNonce`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 24]) -> Self {
        Self(bytes)
    }

    /// Creates an [`AeadNonce`] from a slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(OrdernetError::CryptoError {
                reason: format!("expected {} byte nonce, got {}", Self::LEN, bytes.len()),
            });
        }
        let mut arr = [0u8; 24];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Returns the underlying 24-byte array.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }
}

/// Generates a fresh 192-bit random nonce from OS entropy.
///
/// Each call produces a unique nonce suitable for a single
/// XChaCha20-Poly1305 encryption. The 192-bit space makes accidental
/// collision negligible.
pub fn generate_aead_nonce() -> AeadNonce {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    AeadNonce(bytes)
}

// ---------------------------------------------------------------------------
// Encrypt / Decrypt
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` with XChaCha20-Poly1305.
///
/// # Parameters
///
/// - `key` — 256-bit symmetric key.
/// - `nonce` — 192-bit nonce (must be unique per key; use
///   [`generate_aead_nonce`]).
/// - `plaintext` — data to encrypt.
/// - `aad` — additional authenticated data. Authenticated but **not**
///   encrypted. Pass `&[]` if unused.
///
/// # Returns
///
/// The ciphertext with the 16-byte Poly1305 tag appended
/// (length = plaintext length + 16).
pub fn encrypt(
    key: &[u8; 32],
    nonce: &AeadNonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload { msg: plaintext, aad };

    cipher.encrypt(xnonce, payload).map_err(|e| {
        OrdernetError::CryptoError {
            reason: format!("XChaCha20-Poly1305 encryption failed: {e}"),
        }
    })
}

/// Decrypts `ciphertext` with XChaCha20-Poly1305.
///
/// # Parameters
///
/// - `key` — 256-bit symmetric key (must match the one used for
///   encryption).
/// - `nonce` — 192-bit nonce used during encryption.
/// - `ciphertext` — encrypted data with the Poly1305 tag appended.
/// - `aad` — additional authenticated data (must match what was passed
///   to [`encrypt`]).
///
/// # Errors
///
/// Returns [`OrdernetError::CryptoError`] if tag verification fails
/// (wrong key, wrong nonce, tampered ciphertext, or wrong AAD).
pub fn decrypt(
    key: &[u8; 32],
    nonce: &AeadNonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let xnonce = XNonce::from_slice(&nonce.0);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher.decrypt(xnonce, payload).map_err(|e| {
        OrdernetError::CryptoError {
            reason: format!("XChaCha20-Poly1305 decryption failed: {e}"),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
