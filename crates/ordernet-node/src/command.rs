//! Commands accepted by the node façade.
//!
//! External consumers (the daemon, the out-of-scope UIs) drive the
//! node exclusively through [`NodeCommand`]s on the command channel.
//! Results come back on per-command `oneshot` reply channels; ongoing
//! notifications arrive on the node event channel.

use tokio::sync::oneshot;

use ordernet_types::{ChannelConfig, OnlinePeer, PlainMessage, Result};

use crate::trust::ThresholdResult;

// ---------------------------------------------------------------------------
// NodeStatus
// ---------------------------------------------------------------------------

/// Snapshot of the node's identity and runtime state.
#[derive(Clone, Debug)]
pub struct NodeStatus {
    /// Lowercase hex of the node's public key.
    pub pubkey: String,
    /// Short fingerprint of the public key.
    pub fingerprint: String,
    /// Current nickname.
    pub nickname: String,
    /// libp2p peer id string.
    pub peer_id: String,
    /// Multiaddresses the node is listening on.
    pub listeners: Vec<String>,
    /// Joined channel ids.
    pub channels: Vec<String>,
    /// Current online-peer count (without pruning).
    pub online_peers: usize,
}

// ---------------------------------------------------------------------------
// NodeCommand
// ---------------------------------------------------------------------------

/// Commands handled by the node event loop.
pub enum NodeCommand {
    /// Encrypt, sign, publish, and persist a chat message.
    SendMessage {
        /// Target channel id.
        channel_id: String,
        /// Message text.
        content: String,
        /// Receives the local echo, or the send error.
        reply: oneshot::Sender<Result<PlainMessage>>,
    },

    /// Create (or return) a public channel.
    CreateChannel {
        /// Channel name, with or without the leading `#`.
        name: String,
        /// Vouch threshold override.
        threshold: Option<u32>,
        /// Receives the channel config.
        reply: oneshot::Sender<Result<ChannelConfig>>,
    },

    /// Create (or return) a private, invite-only channel.
    CreatePrivateChannel {
        /// Channel name.
        name: String,
        /// Allowlisted member pubkeys, hex.
        allowed: Vec<String>,
        /// Vouch threshold override (defaults to 1).
        threshold: Option<u32>,
        /// Receives the channel config.
        reply: oneshot::Sender<Result<ChannelConfig>>,
    },

    /// Create (or return) the DM channel with a peer.
    CreateDm {
        /// Peer pubkey, hex.
        peer_pubkey: String,
        /// Receives the channel config.
        reply: oneshot::Sender<Result<ChannelConfig>>,
    },

    /// Leave a channel, dropping local state and history.
    LeaveChannel {
        /// Channel id.
        channel_id: String,
        /// Receives whether the channel existed.
        reply: oneshot::Sender<Result<bool>>,
    },

    /// Add a peer to a channel's allowlist.
    InviteMember {
        /// Channel id.
        channel_id: String,
        /// Peer pubkey, hex.
        peer_pubkey: String,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<()>>,
    },

    /// Produce a portable invite code for a channel.
    InviteCode {
        /// Channel id.
        channel_id: String,
        /// Receives the base64url code.
        reply: oneshot::Sender<Result<String>>,
    },

    /// Join a channel from a pasted invite code.
    ///
    /// `Ok(None)` means the code was invalid — a user-input condition,
    /// not an error.
    AcceptInvite {
        /// The pasted code.
        code: String,
        /// Receives the joined channel config, or `None`.
        reply: oneshot::Sender<Result<Option<ChannelConfig>>>,
    },

    /// Send a join request for a channel to a known member.
    RequestJoin {
        /// Channel id.
        channel_id: String,
        /// A channel member to address, pubkey hex.
        via_pubkey: String,
        /// Receives the dispatch outcome.
        reply: oneshot::Sender<Result<()>>,
    },

    /// Vouch for a peer on a channel.
    Vouch {
        /// The peer being vouched for, pubkey hex.
        vouchee_pubkey: String,
        /// Channel id.
        channel_id: String,
        /// Receives the local threshold evaluation (`None` when the
        /// channel is unknown locally).
        reply: oneshot::Sender<Result<Option<ThresholdResult>>>,
    },

    /// Pull the online peer snapshot (prunes stale entries).
    GetOnlinePeers {
        /// Receives the snapshot.
        reply: oneshot::Sender<Vec<OnlinePeer>>,
    },

    /// Read the vouch edges recorded for a channel.
    GetTrustGraph {
        /// Channel id.
        channel_id: String,
        /// Receives `(voucher, vouchee)` hex pairs, directional from
        /// voucher to vouchee.
        reply: oneshot::Sender<Result<Vec<(String, String)>>>,
    },

    /// Read decrypted channel history.
    GetHistory {
        /// Channel id.
        channel_id: String,
        /// Maximum number of messages.
        limit: u32,
        /// Receives the messages, oldest first.
        reply: oneshot::Sender<Result<Vec<PlainMessage>>>,
    },

    /// Update the node's nickname.
    SetNickname {
        /// New nickname.
        nickname: String,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<()>>,
    },

    /// Dial a peer multiaddr.
    Dial {
        /// Multiaddr string.
        addr: String,
        /// Receives the dial outcome.
        reply: oneshot::Sender<Result<()>>,
    },

    /// Read a status snapshot.
    GetStatus {
        /// Receives the snapshot.
        reply: oneshot::Sender<NodeStatus>,
    },

    /// Stop the event loop gracefully.
    Shutdown,
}
