//! Network events emitted by the OrderNet swarm.
//!
//! [`NetEvent`] is the unified event type the node event loop receives
//! from the transport. All libp2p-specific events are mapped into this
//! enum before being delivered; protocol handling happens upstream.

use libp2p::PeerId;
use ordernet_proto::keyex::KeyExchangePayload;
use ordernet_proto::vouch::VouchMessage;

/// Events emitted by the OrderNet transport adapter.
#[derive(Clone, Debug)]
pub enum NetEvent {
    /// A gossip payload arrived on a subscribed topic.
    ///
    /// Opaque bytes — signature verification, dedup, and decryption
    /// happen in the protocol handlers.
    Gossip {
        /// Peer that propagated the message (not necessarily the
        /// author).
        source: Option<PeerId>,
        /// Topic string the payload was published on.
        topic: String,
        /// Raw payload bytes.
        data: Vec<u8>,
    },

    /// A vouch-protocol envelope arrived over unicast.
    VouchInbound {
        /// Remote peer that opened the stream.
        peer: PeerId,
        /// Decoded envelope (join request or vouch).
        message: VouchMessage,
    },

    /// A key-exchange payload arrived over unicast.
    KeyExchangeInbound {
        /// Remote peer that opened the stream.
        peer: PeerId,
        /// Decoded payload.
        payload: KeyExchangePayload,
    },

    /// A connection to a peer was established.
    PeerConnected(PeerId),

    /// The last connection to a peer closed.
    PeerDisconnected(PeerId),
}
