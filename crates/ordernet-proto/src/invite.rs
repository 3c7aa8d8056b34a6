//! Out-of-band invite codes.
//!
//! An invite code is the base64url encoding of a UTF-8 JSON bundle
//! that fully reconstructs a channel locally, group key included:
//!
//! ```text
//! {version:1, id, name, creatorPubKeyHex, vouchThreshold, accessMode,
//!  inviteOnly, allowedMembers, createdAt, groupKeyHex}
//! ```
//!
//! Decoding is deliberately forgiving about *absence* (missing fields
//! fall back to public/empty) but strict about *malformation*: any
//! base64, JSON, or hex error yields `None` rather than an error, so a
//! garbled paste can never crash the caller.

use std::collections::BTreeSet;

use ordernet_types::{AccessMode, ChannelConfig, OrdernetError, Result};

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use ordernet_crypto::keys::GroupKey;
use serde::{Deserialize, Serialize};

/// Invite code format version this build writes and accepts.
pub const INVITE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// InviteBundle
// ---------------------------------------------------------------------------

/// JSON interior of an invite code.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteBundle {
    version: u32,
    id: String,
    name: String,
    creator_pub_key_hex: String,
    #[serde(default = "default_threshold")]
    vouch_threshold: u32,
    #[serde(default = "default_access_mode")]
    access_mode: AccessMode,
    #[serde(default)]
    invite_only: bool,
    #[serde(default)]
    allowed_members: Vec<String>,
    #[serde(default)]
    created_at: i64,
    group_key_hex: String,
}

fn default_threshold() -> u32 {
    ChannelConfig::DEFAULT_VOUCH_THRESHOLD
}

fn default_access_mode() -> AccessMode {
    AccessMode::Public
}

// ---------------------------------------------------------------------------
// Encode / Decode
// ---------------------------------------------------------------------------

/// Encodes a channel and its group key as a portable invite code.
pub fn encode_invite(config: &ChannelConfig, group_key: &GroupKey) -> Result<String> {
    let bundle = InviteBundle {
        version: INVITE_VERSION,
        id: config.id.clone(),
        name: config.name.clone(),
        creator_pub_key_hex: config.creator_pubkey.clone(),
        vouch_threshold: config.vouch_threshold,
        access_mode: config.access_mode,
        invite_only: config.invite_only,
        allowed_members: config.allowed_members.iter().cloned().collect(),
        created_at: config.created_at,
        group_key_hex: group_key.to_hex(),
    };

    let json = serde_json::to_vec(&bundle).map_err(|e| OrdernetError::MalformedEnvelope {
        reason: format!("invite bundle serialization failed: {e}"),
    })?;

    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes an invite code into a channel config and group key.
///
/// Returns `None` on any decode, parse, version, or hex problem —
/// invalid codes are a user-input condition, not an error.
pub fn decode_invite(code: &str) -> Option<(ChannelConfig, GroupKey)> {
    let trimmed = code.trim();

    let json = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(trimmed))
        .ok()?;

    let bundle: InviteBundle = serde_json::from_slice(&json).ok()?;
    if bundle.version != INVITE_VERSION {
        return None;
    }
    if bundle.id.is_empty() {
        return None;
    }

    let group_key = GroupKey::from_hex(&bundle.group_key_hex).ok()?;

    let allowed_members: BTreeSet<String> = bundle
        .allowed_members
        .into_iter()
        .map(|m| m.to_lowercase())
        .collect();

    let config = ChannelConfig {
        id: bundle.id,
        name: bundle.name,
        creator_pubkey: bundle.creator_pub_key_hex.to_lowercase(),
        vouch_threshold: bundle.vouch_threshold,
        created_at: bundle.created_at,
        access_mode: bundle.access_mode,
        invite_only: bundle.invite_only,
        allowed_members,
    };

    Some((config, group_key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
