//! In-memory channel table with group keys, access policy, and
//! membership, mirrored to the local store.
//!
//! The in-memory [`ChannelState`] is the authoritative runtime copy;
//! the store is the authoritative durable copy. On start the manager
//! repopulates itself from the store and inserts the local identity
//! into every membership set.

use std::collections::{BTreeSet, HashMap};

use ordernet_crypto::keys::GroupKey;
use ordernet_store::Database;
use ordernet_types::{now_millis, AccessMode, ChannelConfig, OrdernetError, Result};

// ---------------------------------------------------------------------------
// ChannelState
// ---------------------------------------------------------------------------

/// Runtime state of one channel: config, group key, membership.
///
/// Invariants: the creator is always a member; the local identity is a
/// member of every channel it has joined.
#[derive(Clone)]
pub struct ChannelState {
    /// Channel metadata and access policy.
    pub config: ChannelConfig,
    /// Shared symmetric key.
    pub group_key: GroupKey,
    /// Known member pubkeys, lowercase hex.
    pub members: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// ChannelOverrides
// ---------------------------------------------------------------------------

/// Optional overrides for [`ChannelManager::create_channel`].
#[derive(Clone, Debug, Default)]
pub struct ChannelOverrides {
    /// Access mode override (default public).
    pub access_mode: Option<AccessMode>,
    /// Invite-only override (default false).
    pub invite_only: Option<bool>,
    /// Extra allowlist entries beyond the local identity.
    pub allowed_members: Vec<String>,
}

// ---------------------------------------------------------------------------
// ChannelManager
// ---------------------------------------------------------------------------

/// Channel table indexed by id.
pub struct ChannelManager {
    channels: HashMap<String, ChannelState>,
    self_hex: String,
}

impl ChannelManager {
    /// Number of hex characters each endpoint contributes to a DM
    /// channel id.
    const DM_ENDPOINT_LEN: usize = 16;

    /// Loads all channels from the store, inserting the local identity
    /// (and each creator) into the membership sets.
    pub fn load(store: &Database, self_hex: &str) -> Result<Self> {
        let self_hex = self_hex.to_lowercase();
        let mut channels = HashMap::new();

        for (config, group_key) in store.list_channels()? {
            let mut members = BTreeSet::new();
            members.insert(self_hex.clone());
            members.insert(config.creator_pubkey.clone());

            channels.insert(
                config.id.clone(),
                ChannelState {
                    config,
                    group_key,
                    members,
                },
            );
        }

        tracing::debug!(count = channels.len(), "channels loaded from store");

        Ok(Self { channels, self_hex })
    }

    /// The local identity's lowercase hex pubkey.
    pub fn self_hex(&self) -> &str {
        &self.self_hex
    }

    /// Looks up a channel by id.
    pub fn get(&self, id: &str) -> Option<&ChannelState> {
        self.channels.get(id)
    }

    /// All channel ids, sorted.
    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Derives the deterministic DM channel id for two endpoints: the
    /// hex keys are sorted lexicographically, then each truncated to
    /// 16 characters, so both endpoints derive the same id.
    pub fn dm_channel_id(a_hex: &str, b_hex: &str) -> String {
        let a = a_hex.to_lowercase();
        let b = b_hex.to_lowercase();
        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        let first_part = &first[..Self::DM_ENDPOINT_LEN.min(first.len())];
        let second_part = &second[..Self::DM_ENDPOINT_LEN.min(second.len())];
        format!("dm-{first_part}-{second_part}")
    }

    /// Creates a channel, or returns the existing state when the id is
    /// already present (no error).
    pub fn create_channel(
        &mut self,
        store: &Database,
        name: &str,
        threshold: Option<u32>,
        overrides: ChannelOverrides,
    ) -> Result<&ChannelState> {
        let id = ChannelConfig::id_from_name(name);

        if self.channels.contains_key(&id) {
            return Ok(&self.channels[&id]);
        }

        let mut allowed_members: BTreeSet<String> = overrides
            .allowed_members
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        allowed_members.insert(self.self_hex.clone());

        let config = ChannelConfig {
            id: id.clone(),
            name: format!("#{id}"),
            creator_pubkey: self.self_hex.clone(),
            vouch_threshold: threshold.unwrap_or(ChannelConfig::DEFAULT_VOUCH_THRESHOLD),
            created_at: now_millis(),
            access_mode: overrides.access_mode.unwrap_or(AccessMode::Public),
            invite_only: overrides.invite_only.unwrap_or(false),
            allowed_members,
        };

        let group_key = GroupKey::generate();
        store.upsert_channel(&config, &group_key)?;

        let mut members = BTreeSet::new();
        members.insert(self.self_hex.clone());

        tracing::info!(channel = %id, mode = %config.access_mode, "channel created");

        self.channels.insert(
            id.clone(),
            ChannelState {
                config,
                group_key,
                members,
            },
        );
        Ok(&self.channels[&id])
    }

    /// Creates a private, invite-only channel with an explicit
    /// allowlist (threshold defaults to 1).
    pub fn create_private_channel(
        &mut self,
        store: &Database,
        name: &str,
        allowed_hexes: Vec<String>,
        threshold: Option<u32>,
    ) -> Result<&ChannelState> {
        self.create_channel(
            store,
            name,
            Some(threshold.unwrap_or(1)),
            ChannelOverrides {
                access_mode: Some(AccessMode::Private),
                invite_only: Some(true),
                allowed_members: allowed_hexes,
            },
        )
    }

    /// Creates (or returns) the DM channel with a peer.
    pub fn create_dm_channel(&mut self, store: &Database, peer_hex: &str) -> Result<&ChannelState> {
        let id = Self::dm_channel_id(&self.self_hex, peer_hex);
        self.create_channel(
            store,
            &id,
            Some(1),
            ChannelOverrides {
                access_mode: Some(AccessMode::Dm),
                invite_only: Some(true),
                allowed_members: vec![peer_hex.to_lowercase()],
            },
        )
    }

    /// Adopts a channel received from an invite code or a key-exchange
    /// delivery: persists the config and key, and inserts the local
    /// identity (and the creator) into the membership set.
    pub fn join_channel(
        &mut self,
        store: &Database,
        config: ChannelConfig,
        group_key: GroupKey,
    ) -> Result<&ChannelState> {
        let id = config.id.clone();
        store.upsert_channel(&config, &group_key)?;

        let mut members = BTreeSet::new();
        members.insert(self.self_hex.clone());
        members.insert(config.creator_pubkey.clone());

        tracing::info!(channel = %id, "channel joined");

        self.channels.insert(
            id.clone(),
            ChannelState {
                config,
                group_key,
                members,
            },
        );
        Ok(&self.channels[&id])
    }

    /// Removes a channel's in-memory and durable state. Returns
    /// whether the channel existed.
    pub fn leave_channel(&mut self, store: &Database, id: &str) -> Result<bool> {
        let existed = self.channels.remove(id).is_some();
        let removed = store.delete_channel(id)?;
        Ok(existed || removed)
    }

    /// Adds a peer to a channel's allowlist.
    ///
    /// On a public, not-yet-invite-only channel this is a successful
    /// no-op. Otherwise the peer is added and the channel becomes
    /// invite-only.
    pub fn invite_member(&mut self, store: &Database, id: &str, peer_hex: &str) -> Result<()> {
        let state = self.channels.get_mut(id).ok_or_else(|| {
            OrdernetError::ConfigError {
                reason: format!("unknown channel '{id}'"),
            }
        })?;

        if state.config.access_mode == AccessMode::Public && !state.config.invite_only {
            return Ok(());
        }

        state
            .config
            .allowed_members
            .insert(peer_hex.to_lowercase());
        state.config.invite_only = true;
        store.upsert_channel(&state.config, &state.group_key)?;
        Ok(())
    }

    /// Records a peer as a known member of a channel (runtime only).
    pub fn add_member(&mut self, id: &str, peer_hex: &str) {
        if let Some(state) = self.channels.get_mut(id) {
            state.members.insert(peer_hex.to_lowercase());
        }
    }

    /// Whether `peer_hex` may participate in the channel: always true
    /// when the channel is not invite-only, otherwise iff the peer is
    /// on the allowlist (case-insensitive).
    pub fn has_access(&self, id: &str, peer_hex: &str) -> bool {
        match self.channels.get(id) {
            None => false,
            Some(state) => {
                !state.config.invite_only
                    || state
                        .config
                        .allowed_members
                        .contains(&peer_hex.to_lowercase())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const PEER_HEX: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn manager() -> (Database, ChannelManager) {
        let db = Database::open_in_memory().expect("db");
        let manager = ChannelManager::load(&db, SELF_HEX).expect("manager");
        (db, manager)
    }

    #[test]
    fn create_strips_hash_and_defaults_to_public() -> Result<()> {
        let (db, mut manager) = manager();
        let state = manager.create_channel(&db, "#general", None, Default::default())?;

        assert_eq!(state.config.id, "general");
        assert_eq!(state.config.name, "#general");
        assert_eq!(state.config.access_mode, AccessMode::Public);
        assert!(!state.config.invite_only);
        assert_eq!(state.config.vouch_threshold, 2);
        assert!(state.config.allowed_members.contains(SELF_HEX));
        assert!(state.members.contains(SELF_HEX));
        Ok(())
    }

    #[test]
    fn create_existing_returns_same_state() -> Result<()> {
        let (db, mut manager) = manager();
        let key1 = manager
            .create_channel(&db, "general", None, Default::default())?
            .group_key
            .clone();
        let key2 = manager
            .create_channel(&db, "#general", Some(5), Default::default())?
            .group_key
            .clone();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
        Ok(())
    }

    #[test]
    fn private_channel_is_invite_only_with_allowlist() -> Result<()> {
        let (db, mut manager) = manager();
        let state =
            manager.create_private_channel(&db, "#team", vec![PEER_HEX.to_uppercase()], None)?;

        assert_eq!(state.config.access_mode, AccessMode::Private);
        assert!(state.config.invite_only);
        assert_eq!(state.config.vouch_threshold, 1);
        assert!(state.config.allowed_members.contains(PEER_HEX));
        assert!(state.config.allowed_members.contains(SELF_HEX));
        Ok(())
    }

    #[test]
    fn dm_id_is_symmetric_and_sorted() {
        let id_ab = ChannelManager::dm_channel_id(SELF_HEX, PEER_HEX);
        let id_ba = ChannelManager::dm_channel_id(PEER_HEX, SELF_HEX);
        assert_eq!(id_ab, id_ba);
        assert_eq!(id_ab, format!("dm-{}-{}", &SELF_HEX[..16], &PEER_HEX[..16]));
    }

    #[test]
    fn dm_channel_allows_both_endpoints_only() -> Result<()> {
        let (db, mut manager) = manager();
        let id = {
            let state = manager.create_dm_channel(&db, PEER_HEX)?;
            assert_eq!(state.config.access_mode, AccessMode::Dm);
            state.config.id.clone()
        };

        assert!(manager.has_access(&id, SELF_HEX));
        assert!(manager.has_access(&id, PEER_HEX));
        assert!(!manager.has_access(&id, &"cc".repeat(32)));
        Ok(())
    }

    #[test]
    fn has_access_rules() -> Result<()> {
        let (db, mut manager) = manager();
        manager.create_channel(&db, "open", None, Default::default())?;
        manager.create_private_channel(&db, "closed", vec![PEER_HEX.into()], None)?;

        // Public: everyone.
        assert!(manager.has_access("open", &"ff".repeat(32)));
        // Private: allowlist only, case-insensitive.
        assert!(manager.has_access("closed", &PEER_HEX.to_uppercase()));
        assert!(!manager.has_access("closed", &"ff".repeat(32)));
        // Unknown channel: nobody.
        assert!(!manager.has_access("nope", SELF_HEX));
        Ok(())
    }

    #[test]
    fn invite_on_public_channel_is_noop() -> Result<()> {
        let (db, mut manager) = manager();
        manager.create_channel(&db, "open", None, Default::default())?;

        manager.invite_member(&db, "open", PEER_HEX)?;
        let state = manager.get("open").expect("state");
        assert!(!state.config.invite_only);
        assert!(!state.config.allowed_members.contains(PEER_HEX));
        Ok(())
    }

    #[test]
    fn invite_on_private_channel_extends_allowlist() -> Result<()> {
        let (db, mut manager) = manager();
        manager.create_private_channel(&db, "closed", vec![], None)?;

        manager.invite_member(&db, "closed", &PEER_HEX.to_uppercase())?;
        assert!(manager.has_access("closed", PEER_HEX));

        // Persisted too.
        let (config, _) = db.get_channel("closed")?.expect("row");
        assert!(config.allowed_members.contains(PEER_HEX));
        Ok(())
    }

    #[test]
    fn leave_removes_memory_and_store() -> Result<()> {
        let (db, mut manager) = manager();
        manager.create_channel(&db, "gone", None, Default::default())?;

        assert!(manager.leave_channel(&db, "gone")?);
        assert!(manager.get("gone").is_none());
        assert!(db.get_channel("gone")?.is_none());
        assert!(!manager.leave_channel(&db, "gone")?);
        Ok(())
    }

    #[test]
    fn reload_restores_channels_with_keys() -> Result<()> {
        let (db, mut manager) = manager();
        let key = manager
            .create_channel(&db, "general", None, Default::default())?
            .group_key
            .clone();

        let reloaded = ChannelManager::load(&db, SELF_HEX)?;
        let state = reloaded.get("general").expect("channel");
        assert_eq!(state.group_key.as_bytes(), key.as_bytes());
        assert!(state.members.contains(SELF_HEX));
        Ok(())
    }

    #[test]
    fn join_channel_inserts_self_and_creator() -> Result<()> {
        let (db, mut manager) = manager();
        let creator = "cc".repeat(32);
        let config = ChannelConfig {
            id: "remote".into(),
            name: "#remote".into(),
            creator_pubkey: creator.clone(),
            vouch_threshold: 2,
            created_at: 0,
            access_mode: AccessMode::Public,
            invite_only: false,
            allowed_members: Default::default(),
        };

        let state = manager.join_channel(&db, config, GroupKey::generate())?;
        assert!(state.members.contains(SELF_HEX));
        assert!(state.members.contains(&creator));
        assert!(db.get_channel("remote")?.is_some());
        Ok(())
    }
}
