//! Presence protocol: periodic signed announcements and the online
//! peer table.
//!
//! Announcements are published every 30 seconds on the well-known
//! presence topic. The online table prunes entries older than 120
//! seconds — but only lazily, when [`PresenceTable::get_online_peers`]
//! is called; `peer-left` events are emitted from that accessor, never
//! autonomously.

use std::collections::HashMap;

use ordernet_proto::presence::PresenceAnnouncement;
use ordernet_store::Database;
use ordernet_types::{OnlinePeer, PeerInfo, Result};

use crate::channels::ChannelManager;
use crate::identity::IdentityManager;

/// Interval between our own announcements, seconds.
pub const ANNOUNCE_INTERVAL_SECS: u64 = 30;

/// Age past which a peer is considered offline, milliseconds.
pub const PEER_TTL_MS: i64 = 120_000;

// ---------------------------------------------------------------------------
// PresenceTable
// ---------------------------------------------------------------------------

/// In-memory table of currently online peers, keyed by hex pubkey.
pub struct PresenceTable {
    peers: HashMap<String, OnlinePeer>,
    ttl_ms: i64,
}

impl Default for PresenceTable {
    fn default() -> Self {
        Self::new(PEER_TTL_MS)
    }
}

impl PresenceTable {
    /// Creates a table with an explicit TTL (tests shrink it).
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            peers: HashMap::new(),
            ttl_ms,
        }
    }

    /// Records an announcement. Returns `true` when this is the peer's
    /// first appearance (a `peer-joined` moment).
    ///
    /// `last_seen` is monotonic: an announcement older than the
    /// recorded one is ignored.
    pub fn observe(&mut self, pubkey_hex: &str, nickname: &str, timestamp: i64) -> bool {
        let key = pubkey_hex.to_lowercase();
        match self.peers.get_mut(&key) {
            Some(entry) => {
                if timestamp >= entry.last_seen {
                    entry.last_seen = timestamp;
                    entry.nickname = nickname.to_string();
                }
                false
            }
            None => {
                self.peers.insert(
                    key.clone(),
                    OnlinePeer {
                        pubkey: key,
                        nickname: nickname.to_string(),
                        last_seen: timestamp,
                    },
                );
                true
            }
        }
    }

    /// Prunes entries older than the TTL and returns the current
    /// snapshot. The second element lists the pruned pubkeys so the
    /// caller can emit `peer-left` once for each.
    pub fn get_online_peers(&mut self, now_ms: i64) -> (Vec<OnlinePeer>, Vec<String>) {
        let cutoff = now_ms - self.ttl_ms;
        let pruned: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, p)| p.last_seen < cutoff)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &pruned {
            self.peers.remove(key);
        }

        let mut snapshot: Vec<OnlinePeer> = self.peers.values().cloned().collect();
        snapshot.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        (snapshot, pruned)
    }

    /// Current number of tracked peers (without pruning).
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Announce / process
// ---------------------------------------------------------------------------

/// Builds this node's signed announcement.
pub fn build_announcement(
    identity: &IdentityManager,
    channels: &ChannelManager,
    timestamp: i64,
) -> Result<PresenceAnnouncement> {
    PresenceAnnouncement::build(
        identity.keypair(),
        identity.nickname(),
        timestamp,
        channels.channel_ids(),
    )
}

/// Outcome of processing a peer announcement.
#[derive(Clone, Debug)]
pub struct PresenceOutcome {
    /// The verified announcement.
    pub announcement: PresenceAnnouncement,
    /// Whether this was the peer's first appearance.
    pub first_seen: bool,
}

/// Verifies and applies an inbound announcement.
///
/// Returns `Ok(None)` for self-announcements (every node hears its own
/// gossip); `Err` for malformed payloads or bad signatures. On success
/// the online table and the durable peer row are both refreshed.
pub fn process_announcement(
    bytes: &[u8],
    self_hex: &str,
    table: &mut PresenceTable,
    store: &Database,
) -> Result<Option<PresenceOutcome>> {
    let announcement = PresenceAnnouncement::from_bytes(bytes)?;
    announcement.verify()?;

    let pubkey_hex = announcement.pub_key.to_hex();
    if pubkey_hex == self_hex.to_lowercase() {
        return Ok(None);
    }

    let first_seen = table.observe(&pubkey_hex, &announcement.nickname, announcement.timestamp);

    // Refresh the durable peer row, carrying forward what the
    // announcement does not know (first_seen, multiaddrs).
    let existing = store.get_peer(&pubkey_hex)?;
    let peer = PeerInfo {
        pubkey: pubkey_hex,
        nickname: announcement.nickname.clone(),
        first_seen: existing
            .as_ref()
            .map(|p| p.first_seen)
            .unwrap_or(announcement.timestamp),
        last_seen: announcement.timestamp,
        multiaddrs: existing.map(|p| p.multiaddrs).unwrap_or_default(),
    };
    store.upsert_peer(&peer)?;

    Ok(Some(PresenceOutcome {
        announcement,
        first_seen,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
