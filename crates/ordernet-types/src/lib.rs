//! Core shared types for the OrderNet peer-to-peer chat node.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here.

pub mod config;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Current UTC time as milliseconds since the Unix epoch.
///
/// All timestamps in OrderNet are millisecond integers so that wire
/// envelopes, database rows, and in-memory state agree on one clock
/// representation.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// AccessMode
// ---------------------------------------------------------------------------

/// Access policy of a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Anyone who knows the channel id and group key may participate.
    Public,
    /// Only members on the allowlist may participate.
    Private,
    /// Two-party direct-message channel.
    Dm,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Dm => write!(f, "dm"),
        }
    }
}

impl FromStr for AccessMode {
    type Err = OrdernetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "dm" => Ok(Self::Dm),
            other => Err(OrdernetError::ConfigError {
                reason: format!("unknown access mode '{other}'"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Immutable-by-intent channel metadata.
///
/// The channel id is the name without the leading `#`. Member pubkeys
/// are stored as lowercase hex strings; `allowed_members` always
/// contains the local identity for channels created locally.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identifier (name without the `#` prefix).
    pub id: String,
    /// Display name, including the `#` prefix.
    pub name: String,
    /// Lowercase hex of the creator's Ed25519 public key.
    pub creator_pubkey: String,
    /// Number of vouches required to approve a join request.
    pub vouch_threshold: u32,
    /// Creation time, milliseconds since epoch.
    pub created_at: i64,
    /// Access policy.
    pub access_mode: AccessMode,
    /// Whether membership is restricted to `allowed_members`.
    pub invite_only: bool,
    /// Allowlisted member pubkeys, lowercase hex. Ordered for
    /// deterministic serialization.
    pub allowed_members: BTreeSet<String>,
}

impl ChannelConfig {
    /// Default vouch threshold for newly created channels.
    pub const DEFAULT_VOUCH_THRESHOLD: u32 = 2;

    /// Strips the leading `#` from a channel name to form its id.
    pub fn id_from_name(name: &str) -> String {
        name.strip_prefix('#').unwrap_or(name).to_string()
    }
}

// ---------------------------------------------------------------------------
// PeerInfo
// ---------------------------------------------------------------------------

/// An observed remote participant, keyed by its Ed25519 public key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Lowercase hex of the peer's public key (primary key).
    pub pubkey: String,
    /// Last announced nickname.
    pub nickname: String,
    /// First time this peer was seen, milliseconds since epoch.
    pub first_seen: i64,
    /// Most recent time this peer was seen, milliseconds since epoch.
    pub last_seen: i64,
    /// Known multiaddresses, most recent last.
    pub multiaddrs: Vec<String>,
}

// ---------------------------------------------------------------------------
// OnlinePeer
// ---------------------------------------------------------------------------

/// Snapshot entry returned by the presence table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OnlinePeer {
    /// Lowercase hex of the peer's public key.
    pub pubkey: String,
    /// Nickname from the most recent announcement.
    pub nickname: String,
    /// Timestamp of the most recent announcement, milliseconds.
    pub last_seen: i64,
}

// ---------------------------------------------------------------------------
// JoinRequest
// ---------------------------------------------------------------------------

/// State of a join request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    /// Waiting for vouches.
    Pending,
    /// Vouch count reached the channel threshold.
    Approved,
    /// Explicitly denied.
    Denied,
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

impl FromStr for JoinStatus {
    type Err = OrdernetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            other => Err(OrdernetError::StorageError {
                reason: format!("unknown join request status '{other}'"),
            }),
        }
    }
}

/// A record that a pubkey wants access to a channel.
///
/// Primary key is `(requester, channel)`. `vouches_received` is
/// recomputed from the vouch table whenever a vouch is saved.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Lowercase hex of the requester's public key.
    pub requester_pubkey: String,
    /// Target channel id.
    pub channel_id: String,
    /// Request time, milliseconds since epoch.
    pub timestamp: i64,
    /// Count of vouches currently recorded for this request.
    pub vouches_received: u32,
    /// Current state.
    pub status: JoinStatus,
}

// ---------------------------------------------------------------------------
// PlainMessage
// ---------------------------------------------------------------------------

/// A decrypted chat message as delivered to consumers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlainMessage {
    /// Channel the message belongs to.
    pub channel_id: String,
    /// Decrypted message text.
    pub content: String,
    /// Sender's nickname at send time.
    pub sender_nick: String,
    /// Lowercase hex of the sender's public key.
    pub sender_pubkey: String,
    /// Sender-claimed timestamp, milliseconds since epoch. Advisory.
    pub timestamp: i64,
    /// Globally unique message id (hex of 16 random bytes).
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// NodeEvent
// ---------------------------------------------------------------------------

/// Events emitted by the node façade to its consumers.
///
/// A single tagged sum consumed by subscribers; delivery is best-effort,
/// in arrival order per subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeEvent {
    /// A verified, decrypted channel message.
    Message {
        /// The decrypted message.
        plain: PlainMessage,
    },
    /// A verified, decrypted direct message.
    Dm {
        /// The decrypted message.
        plain: PlainMessage,
    },
    /// A peer appeared in the presence table for the first time.
    PeerJoined {
        /// Lowercase hex of the peer's public key.
        pubkey: String,
        /// Announced nickname.
        nickname: String,
    },
    /// A peer was pruned from the presence table.
    PeerLeft {
        /// Lowercase hex of the peer's public key.
        pubkey: String,
    },
    /// A join request arrived over the vouch protocol.
    JoinRequest {
        /// Lowercase hex of the requester's public key.
        requester_pubkey: String,
        /// Requester's nickname.
        nickname: String,
        /// Target channel id.
        channel_id: String,
    },
    /// A valid vouch arrived over the vouch protocol.
    VouchReceived {
        /// Lowercase hex of the voucher's public key.
        voucher_pubkey: String,
        /// Lowercase hex of the vouchee's public key.
        vouchee_pubkey: String,
        /// Target channel id.
        channel_id: String,
    },
    /// A join request crossed its channel's vouch threshold.
    ChannelJoined {
        /// Channel id.
        channel_id: String,
        /// Lowercase hex of the approved member's public key.
        member_pubkey: String,
    },
    /// A group key arrived over the key-exchange protocol.
    KeyReceived {
        /// Channel id the key unlocks.
        channel_id: String,
    },
    /// A valid presence announcement was processed.
    Presence {
        /// Lowercase hex of the announcing peer's public key.
        pubkey: String,
        /// Announced nickname.
        nickname: String,
        /// Channels the peer announced.
        channels: Vec<String>,
    },
    /// A non-fatal error the consumer should know about.
    Error {
        /// Human-readable description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// OrdernetError
// ---------------------------------------------------------------------------

/// Central error type for the OrderNet node.
///
/// All crates in the workspace convert their internal errors into
/// variants of this enum. Inbound protocol handlers never let these
/// cross the transport boundary: failures become `NodeEvent::Error`
/// emissions or silent drops.
#[derive(Debug, Error)]
pub enum OrdernetError {
    /// AEAD failure, signature mismatch, or bad key length.
    #[error("crypto error: {reason}")]
    CryptoError {
        /// Human-readable description of the cryptographic failure.
        reason: String,
    },

    /// The sender is not on the channel's allowlist.
    #[error("access denied: {reason}")]
    AccessDenied {
        /// Human-readable description of the denial.
        reason: String,
    },

    /// JSON parse failure, wrong channel/topic pairing, or bad lengths.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Human-readable description. Never contains message content.
        reason: String,
    },

    /// A database operation failed.
    #[error("storage error: {reason}")]
    StorageError {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A dial or publish failed.
    #[error("transport error: {reason}")]
    TransportError {
        /// Human-readable description of the transport failure.
        reason: String,
    },

    /// A user-supplied invite code could not be decoded.
    #[error("invalid invite code")]
    InvalidInviteCode,

    /// The configured passphrase cannot decrypt the stored private key.
    #[error("identity locked: passphrase does not decrypt the stored key")]
    IdentityLocked,

    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`OrdernetError`].
pub type Result<T> = std::result::Result<T, OrdernetError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        for mode in [AccessMode::Public, AccessMode::Private, AccessMode::Dm] {
            let parsed: AccessMode = mode.to_string().parse()?;
            assert_eq!(mode, parsed);
        }
        Ok(())
    }

    #[test]
    fn access_mode_rejects_unknown() {
        let result: std::result::Result<AccessMode, _> = "secret".parse();
        assert!(result.is_err());
    }

    #[test]
    fn join_status_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        for status in [JoinStatus::Pending, JoinStatus::Approved, JoinStatus::Denied] {
            let parsed: JoinStatus = status.to_string().parse()?;
            assert_eq!(status, parsed);
        }
        Ok(())
    }

    #[test]
    fn channel_id_strips_hash() {
        assert_eq!(ChannelConfig::id_from_name("#general"), "general");
        assert_eq!(ChannelConfig::id_from_name("general"), "general");
        assert_eq!(ChannelConfig::id_from_name("##odd"), "#odd");
    }

    #[test]
    fn error_display_contains_reason() {
        let err = OrdernetError::StorageError {
            reason: "disk full".into(),
        };
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn identity_locked_display() {
        let err = OrdernetError::IdentityLocked;
        assert!(err.to_string().contains("identity locked"));
    }

    #[test]
    fn now_millis_is_positive() {
        assert!(now_millis() > 0);
    }

    #[test]
    fn node_event_serde_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let event = NodeEvent::PeerJoined {
            pubkey: "ab".repeat(32),
            nickname: "alice".into(),
        };
        let json = serde_json::to_string(&event)?;
        let parsed: NodeEvent = serde_json::from_str(&json)?;
        match parsed {
            NodeEvent::PeerJoined { nickname, .. } => assert_eq!(nickname, "alice"),
            other => panic!("unexpected event: {other:?}"),
        }
        Ok(())
    }
}
