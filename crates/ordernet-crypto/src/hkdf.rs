//! HKDF-SHA256 key derivation for the key-exchange protocol.
//!
//! Implements the HMAC-based Extract-and-Expand Key Derivation Function
//! (RFC 5869) using SHA-256. Used to derive the symmetric wrapping key
//! from an X25519 shared secret before a channel group key is encrypted
//! for a recipient.
//!
//! The output is automatically zeroized on drop.

use ordernet_types::{OrdernetError, Result};

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Domain-separation info string for key-exchange derivation.
pub const KEYEX_INFO: &[u8] = b"ordernet-keyex";

// ---------------------------------------------------------------------------
// WrapKey
// ---------------------------------------------------------------------------

/// 256-bit key derived by HKDF-SHA256.
///
/// Automatically zeroized when dropped to prevent sensitive material
/// from lingering in memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrapKey([u8; 32]);

impl WrapKey {
    /// Fixed byte length of the derived key.
    pub const LEN: usize = 32;

    /// Returns the derived key material.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// WrapKey does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derives a 32-byte key from input keying material using HKDF-SHA256.
///
/// # Parameters
///
/// - `ikm` — input keying material (the X25519 shared secret).
/// - `info` — context string; the key-exchange path passes
///   [`KEYEX_INFO`].
///
/// No salt is used (RFC 5869 §3.1: an absent salt is a zero-filled
/// salt of hash length).
///
/// # Errors
///
/// Returns [`OrdernetError::CryptoError`] if HKDF expansion fails.
pub fn hkdf_sha256(ikm: &[u8], info: &[u8]) -> Result<WrapKey> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; WrapKey::LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| OrdernetError::CryptoError {
            reason: format!("HKDF-SHA256 expansion failed: {e}"),
        })?;

    Ok(WrapKey(okm))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
