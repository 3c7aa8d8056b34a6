//! Channel group keys.
//!
//! Every channel shares one 256-bit symmetric key among its members.
//! The key is long-lived (no rotation-based forward secrecy) and is
//! distributed either out-of-band inside an invite code or over the
//! key-exchange protocol.

use ordernet_types::{OrdernetError, Result};

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// GroupKey
// ---------------------------------------------------------------------------

/// 256-bit symmetric channel key, identical across all members.
///
/// `Clone` is deliberate: channel state, invite codes, and the
/// key-exchange sender all need their own copy. Every copy zeroizes
/// its memory on drop.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct GroupKey([u8; 32]);

impl GroupKey {
    /// Fixed byte length of a group key.
    pub const LEN: usize = 32;

    /// Generates a fresh random group key from OS entropy.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates a [`GroupKey`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a [`GroupKey`] from a slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(OrdernetError::CryptoError {
                reason: format!("expected {} byte group key, got {}", Self::LEN, bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parses a [`GroupKey`] from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| OrdernetError::CryptoError {
            reason: "group key is not valid hex".into(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Returns the underlying 32-byte array.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// GroupKey does not implement Debug to keep key material out of logs.

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(GroupKey::generate().as_bytes(), GroupKey::generate().as_bytes());
    }

    #[test]
    fn hex_roundtrip() -> ordernet_types::Result<()> {
        let key = GroupKey::generate();
        let parsed = GroupKey::from_hex(&key.to_hex())?;
        assert_eq!(key.as_bytes(), parsed.as_bytes());
        Ok(())
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(GroupKey::from_hex("zz").is_err());
        assert!(GroupKey::from_hex(&"ab".repeat(16)).is_err());
        assert!(GroupKey::from_hex(&"ab".repeat(33)).is_err());
    }

    #[test]
    fn from_slice_validates_length() {
        assert!(GroupKey::from_slice(&[0u8; 32]).is_ok());
        assert!(GroupKey::from_slice(&[0u8; 31]).is_err());
    }
}
