//! Ed25519 digital signature operations.
//!
//! Provides keypair generation, message signing, signature verification,
//! and public-key fingerprinting. The private key is automatically
//! zeroized on drop via `ed25519-dalek`'s built-in `ZeroizeOnDrop`.

use ordernet_types::{OrdernetError, Result};

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// Ed25519 public key (32 bytes).
///
/// Wrapper around the raw verifying key bytes. Serializes on the wire
/// as a JSON array of 32 integers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Fixed byte length of an Ed25519 public key.
    pub const LEN: usize = 32;

    /// Creates a [`PublicKey`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a [`PublicKey`] from a hex string (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| OrdernetError::CryptoError {
            reason: "public key is not valid hex".into(),
        })?;
        if bytes.len() != Self::LEN {
            return Err(OrdernetError::CryptoError {
                reason: format!("expected {} byte public key, got {}", Self::LEN, bytes.len()),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
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

/// Formats a public key as `<first-8>..<last-4>` of its lowercase hex.
pub fn fingerprint(public_key: &PublicKey) -> String {
    let full = public_key.to_hex();
    format!("{}..{}", &full[..8], &full[full.len() - 4..])
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Ed25519 signature (64 bytes).
///
/// Contains the raw signature bytes produced by [`Keypair::sign`] and
/// consumed by [`verify`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Signature([u8; 64]);

impl serde::Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SigVisitor;

        impl<'de> serde::de::Visitor<'de> for SigVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("64 bytes for Ed25519 signature")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Signature, E> {
                if v.len() != 64 {
                    return Err(E::invalid_length(v.len(), &"64"));
                }
                let mut arr = [0u8; 64];
                arr.copy_from_slice(v);
                Ok(Signature(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Signature, A::Error> {
                let mut arr = [0u8; 64];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &"64"))?;
                }
                Ok(Signature(arr))
            }
        }

        deserializer.deserialize_bytes(SigVisitor)
    }
}

impl Signature {
    /// Fixed byte length of an Ed25519 signature.
    pub const LEN: usize = 64;

    /// Creates a [`Signature`] from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying 64-byte array.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// Ed25519 signing keypair.
///
/// Wraps an `ed25519-dalek` [`SigningKey`]. The private key is
/// automatically zeroized when this struct is dropped, courtesy of
/// `ed25519-dalek`'s `ZeroizeOnDrop` implementation.
pub struct Keypair {
    /// Internal signing key. `pub(crate)` so [`crate::ecdh`] can convert
    /// to X25519 without exposing the seed to external callers.
    pub(crate) signing_key: SigningKey,
}

impl Keypair {
    /// Generates a new random keypair using OS-level entropy.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Reconstructs a keypair deterministically from a 32-byte seed.
    ///
    /// Given the same seed, this always produces the same keypair.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Returns the public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs an arbitrary message and returns the Ed25519 signature.
    ///
    /// The signature covers the entire `message` byte slice.
    /// Deterministic: the same keypair + message always yields the
    /// same signature (Ed25519 is deterministic per RFC 8032).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature(sig.to_bytes())
    }

    /// Returns the 32-byte seed (secret scalar) of this keypair.
    ///
    /// This is the minimal secret material needed to reconstruct the
    /// full keypair deterministically. Used by the identity manager to
    /// encrypt the private half at rest.
    ///
    /// # Security
    ///
    /// The returned bytes are sensitive key material. Callers **must**
    /// zeroize or discard the copy as soon as it is no longer needed.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Returns the full 64-byte keypair encoding (seed ‖ public key).
    ///
    /// This matches the `ed25519-dalek` canonical encoding and is
    /// accepted by `libp2p::identity::ed25519::Keypair::try_from_bytes`.
    ///
    /// # Security
    ///
    /// The returned bytes contain the private key. Callers **must**
    /// zeroize or discard the copy as soon as it is no longer needed.
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }
}

// Keypair intentionally does not implement Clone or Debug to prevent
// accidental leakage of the private key in logs or copies.

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Verifies an Ed25519 signature against a public key and message.
///
/// Returns `Ok(())` if the signature is valid, or
/// [`OrdernetError::CryptoError`] if verification fails.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<()> {
    let vk = VerifyingKey::from_bytes(&public_key.0).map_err(|e| {
        OrdernetError::CryptoError {
            reason: format!("invalid public key: {e}"),
        }
    })?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify_strict(message, &sig).map_err(|e| {
        OrdernetError::CryptoError {
            reason: format!("signature verification failed: {e}"),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
