//! Conversion between OrderNet identities and libp2p identities.
//!
//! All conversions are deterministic: the same Ed25519 keypair always
//! produces the same libp2p `Keypair` and `PeerId`. That determinism
//! is what lets unicast be addressed by public key — any node can
//! derive the `PeerId` of a peer it only knows by its Ed25519 key.

use libp2p::identity;
use libp2p::PeerId;

use ordernet_crypto::signing::{Keypair, PublicKey};
use ordernet_types::{OrdernetError, Result};

/// Converts an OrderNet Ed25519 keypair into a libp2p identity.
///
/// Internally copies the 64-byte keypair encoding (seed ‖ public key)
/// and passes it to libp2p's `ed25519::Keypair::try_from_bytes`, which
/// zeroes the input buffer on success.
///
/// # Errors
///
/// Returns `OrdernetError::TransportError` if the raw bytes cannot be
/// parsed as a valid Ed25519 keypair by libp2p.
pub fn node_keypair_to_libp2p(keypair: &Keypair) -> Result<identity::Keypair> {
    let mut raw = keypair.to_keypair_bytes();

    let ed25519_kp = identity::ed25519::Keypair::try_from_bytes(&mut raw).map_err(|e| {
        OrdernetError::TransportError {
            reason: format!("failed to convert node keypair to libp2p identity: {e}"),
        }
    })?;

    Ok(identity::Keypair::from(ed25519_kp))
}

/// Derives the deterministic `PeerId` for an Ed25519 public key.
///
/// # Errors
///
/// Returns `OrdernetError::TransportError` if the raw bytes are not a
/// valid Ed25519 public key.
pub fn peer_id_from_public_key(public_key: &PublicKey) -> Result<PeerId> {
    let ed25519_pk =
        identity::ed25519::PublicKey::try_from_bytes(public_key.as_bytes()).map_err(|e| {
            OrdernetError::TransportError {
                reason: format!("failed to convert public key to libp2p public key: {e}"),
            }
        })?;

    let libp2p_pk = identity::PublicKey::from(ed25519_pk);
    Ok(PeerId::from(libp2p_pk))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
