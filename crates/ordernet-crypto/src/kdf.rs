//! Argon2id key derivation for identity encryption at rest.
//!
//! Derives a 256-bit encryption key from the node passphrase and a
//! random salt using Argon2id (memory-hard, GPU-resistant). The
//! parameters are fixed for interoperability: an identity row written
//! by one build must decrypt under any other.

use ordernet_types::{OrdernetError, Result};

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Memory cost in KiB (64 MiB).
const M_COST: u32 = 65_536;

/// Time cost (number of passes).
const T_COST: u32 = 3;

/// Parallelism degree.
const P_COST: u32 = 1;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// DerivedKey
// ---------------------------------------------------------------------------

/// 256-bit key derived by Argon2id.
///
/// Automatically zeroized when dropped to minimize the time sensitive
/// material resides in memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    /// Fixed byte length of the derived key.
    pub const LEN: usize = 32;

    /// Returns the raw 32-byte key material.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// DerivedKey does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Generates a fresh random 16-byte salt from OS entropy.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives a 256-bit key from a passphrase and salt using Argon2id
/// with `t=3, m=65536 KiB, p=1`.
///
/// # Errors
///
/// Returns [`OrdernetError::CryptoError`] if the underlying Argon2
/// computation fails (e.g. salt shorter than the library minimum).
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<DerivedKey> {
    let params = argon2::Params::new(M_COST, T_COST, P_COST, Some(DerivedKey::LEN))
        .map_err(|e| OrdernetError::CryptoError {
            reason: format!("invalid Argon2 parameters: {e}"),
        })?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    );

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| OrdernetError::CryptoError {
            reason: format!("Argon2id derivation failed: {e}"),
        })?;

    Ok(DerivedKey(output))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
