//! High-level swarm wrapper for the OrderNet transport.
//!
//! [`OrdernetSwarm`] encapsulates the libp2p `Swarm` with the combined
//! [`OrdernetBehaviour`] and surfaces a small command API (subscribe,
//! publish, unicast send, dial) plus a cancel-safe [`poll_next`] for
//! integration with the node event loop's `tokio::select!`.

use std::time::Duration;

use futures::StreamExt;
use libp2p::gossipsub;
use libp2p::mdns;
use libp2p::request_response::{self, ProtocolSupport};
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{noise, tcp, yamux, Multiaddr, PeerId, StreamProtocol, Swarm};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use ordernet_crypto::signing::Keypair;
use ordernet_proto::keyex::KeyExchangePayload;
use ordernet_proto::topics::{KEYEX_PROTOCOL, VOUCH_PROTOCOL};
use ordernet_proto::vouch::VouchMessage;
use ordernet_types::{OrdernetError, Result as OrdernetResult};

use crate::config::{NetConfig, MAX_GOSSIP_SIZE};
use crate::events::NetEvent;
use crate::identity::node_keypair_to_libp2p;

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

/// Empty acknowledgement closing a one-shot unicast exchange.
///
/// The vouch and key-exchange protocols are fire-and-forget; the ack
/// carries no information and senders ignore it beyond delivery
/// logging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ack;

// ---------------------------------------------------------------------------
// Combined behaviour
// ---------------------------------------------------------------------------

/// Combined libp2p behaviour for OrderNet.
///
/// Composes:
/// - `gossipsub::Behaviour` — chat and presence pub/sub (signed).
/// - `json::Behaviour<VouchMessage, Ack>` — vouch unicast.
/// - `json::Behaviour<KeyExchangePayload, Ack>` — key-exchange unicast.
/// - `Toggle<mdns::tokio::Behaviour>` — optional LAN discovery.
///
/// The `#[derive(NetworkBehaviour)]` macro auto-generates
/// `OrdernetBehaviourEvent` with one variant per field.
#[derive(NetworkBehaviour)]
pub struct OrdernetBehaviour {
    /// Pub/sub for chat topics and presence.
    pub gossip: gossipsub::Behaviour,
    /// Join requests and vouches (JSON codec).
    pub vouch: request_response::json::Behaviour<VouchMessage, Ack>,
    /// Group-key delivery (JSON codec).
    pub keyex: request_response::json::Behaviour<KeyExchangePayload, Ack>,
    /// Optional mDNS LAN discovery.
    pub mdns: Toggle<mdns::tokio::Behaviour>,
}

// ---------------------------------------------------------------------------
// OrdernetSwarm
// ---------------------------------------------------------------------------

/// High-level wrapper around `Swarm<OrdernetBehaviour>`.
pub struct OrdernetSwarm {
    swarm: Swarm<OrdernetBehaviour>,
    event_tx: mpsc::UnboundedSender<NetEvent>,
}

impl OrdernetSwarm {
    /// Creates a new swarm from the node's Ed25519 identity.
    ///
    /// Returns `(swarm, event_receiver)`; the receiver delivers all
    /// [`NetEvent`]s to the node event loop.
    ///
    /// # Errors
    ///
    /// Returns `OrdernetError::TransportError` if transport, behaviour,
    /// or identity construction fails.
    pub fn new(
        config: &NetConfig,
        keypair: &Keypair,
    ) -> OrdernetResult<(Self, mpsc::UnboundedReceiver<NetEvent>)> {
        config.validate()?;

        let libp2p_keypair = node_keypair_to_libp2p(keypair)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let enable_mdns = config.enable_mdns;
        let idle_timeout = config.idle_timeout_secs;

        let swarm = libp2p::SwarmBuilder::with_existing_identity(libp2p_keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to configure TCP transport: {e}"),
            })?
            .with_behaviour(|key| {
                build_behaviour(key, enable_mdns)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to build network behaviour: {e}"),
            })?
            .with_swarm_config(|cfg| {
                cfg.with_idle_connection_timeout(Duration::from_secs(idle_timeout))
            })
            .build();

        Ok((Self { swarm, event_tx }, event_rx))
    }

    /// Returns the local `PeerId` of this swarm.
    pub fn local_peer_id(&self) -> &PeerId {
        self.swarm.local_peer_id()
    }

    /// Starts listening on the configured address.
    pub fn start_listening(&mut self, addr: Multiaddr) -> OrdernetResult<()> {
        self.swarm
            .listen_on(addr)
            .map(|_| ())
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to start listening: {e}"),
            })
    }

    /// Returns the addresses this swarm is currently listening on.
    pub fn listeners(&self) -> Vec<Multiaddr> {
        self.swarm.listeners().cloned().collect()
    }

    /// Dials a remote peer at the given multiaddr.
    pub fn dial(&mut self, addr: Multiaddr) -> OrdernetResult<()> {
        self.swarm
            .dial(addr)
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to dial peer: {e}"),
            })
    }

    /// Records a known address for a peer so unicast dials can reach it.
    pub fn add_peer_address(&mut self, peer: PeerId, addr: Multiaddr) {
        self.swarm.add_peer_address(peer, addr);
    }

    // -----------------------------------------------------------------------
    // Gossip
    // -----------------------------------------------------------------------

    /// Subscribes to a gossip topic.
    pub fn subscribe(&mut self, topic: &str) -> OrdernetResult<()> {
        let t = gossipsub::IdentTopic::new(topic);
        self.swarm
            .behaviour_mut()
            .gossip
            .subscribe(&t)
            .map(|_| ())
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to subscribe to topic '{topic}': {e}"),
            })
    }

    /// Unsubscribes from a gossip topic.
    pub fn unsubscribe(&mut self, topic: &str) {
        let t = gossipsub::IdentTopic::new(topic);
        let _ = self.swarm.behaviour_mut().gossip.unsubscribe(&t);
    }

    /// Publishes a payload to a gossip topic.
    ///
    /// # Errors
    ///
    /// Returns `OrdernetError::TransportError` if the payload exceeds
    /// [`MAX_GOSSIP_SIZE`] or publishing fails (e.g. no peers in the
    /// mesh yet).
    pub fn publish(&mut self, topic: &str, data: Vec<u8>) -> OrdernetResult<()> {
        if data.len() > MAX_GOSSIP_SIZE {
            return Err(OrdernetError::TransportError {
                reason: format!(
                    "gossip payload size {} exceeds maximum {MAX_GOSSIP_SIZE}",
                    data.len(),
                ),
            });
        }

        let t = gossipsub::IdentTopic::new(topic);
        self.swarm
            .behaviour_mut()
            .gossip
            .publish(t, data)
            .map(|_| ())
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("failed to publish to topic '{topic}': {e}"),
            })
    }

    // -----------------------------------------------------------------------
    // Unicast
    // -----------------------------------------------------------------------

    /// Sends a vouch-protocol envelope to a peer.
    pub fn send_vouch(&mut self, peer: &PeerId, message: VouchMessage) {
        let request_id = self
            .swarm
            .behaviour_mut()
            .vouch
            .send_request(peer, message);
        tracing::debug!(%peer, ?request_id, "vouch message dispatched");
    }

    /// Sends a key-exchange payload to a peer.
    pub fn send_keyex(&mut self, peer: &PeerId, payload: KeyExchangePayload) {
        let request_id = self
            .swarm
            .behaviour_mut()
            .keyex
            .send_request(peer, payload);
        tracing::debug!(%peer, ?request_id, "key exchange dispatched");
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Processes exactly one swarm event.
    ///
    /// Designed for `tokio::select!` in the node event loop.
    ///
    /// # Cancel safety
    ///
    /// Cancel-safe: if the future is dropped before completion, events
    /// remain in the swarm's internal queue for the next poll.
    pub async fn poll_next(&mut self) {
        let event = self.swarm.select_next_some().await;
        self.dispatch_swarm_event(event);
    }

    /// Dispatches a single swarm event.
    fn dispatch_swarm_event(&mut self, event: SwarmEvent<OrdernetBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!(%address, "new listen address");
            }

            SwarmEvent::ConnectionEstablished {
                peer_id,
                num_established,
                ..
            } => {
                tracing::info!(%peer_id, num_established, "connection established");
                let _ = self.event_tx.send(NetEvent::PeerConnected(peer_id));
            }

            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                tracing::info!(%peer_id, ?cause, num_established, "connection closed");
                if num_established == 0 {
                    let _ = self.event_tx.send(NetEvent::PeerDisconnected(peer_id));
                }
            }

            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                tracing::warn!(?peer_id, %error, "outgoing connection error");
            }

            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),

            other => {
                tracing::trace!(?other, "unhandled swarm event");
            }
        }
    }

    fn handle_behaviour_event(&mut self, event: OrdernetBehaviourEvent) {
        match event {
            OrdernetBehaviourEvent::Gossip(gossipsub::Event::Message {
                message, ..
            }) => {
                let _ = self.event_tx.send(NetEvent::Gossip {
                    source: message.source,
                    topic: message.topic.to_string(),
                    data: message.data,
                });
            }
            OrdernetBehaviourEvent::Gossip(gossipsub::Event::Subscribed { peer_id, topic }) => {
                tracing::debug!(%peer_id, %topic, "peer subscribed to topic");
            }
            OrdernetBehaviourEvent::Gossip(other) => {
                tracing::trace!(?other, "other gossipsub event");
            }

            OrdernetBehaviourEvent::Vouch(event) => {
                if let Some((peer, channel, message)) = inbound_request(event) {
                    if self
                        .swarm
                        .behaviour_mut()
                        .vouch
                        .send_response(channel, Ack)
                        .is_err()
                    {
                        tracing::warn!(%peer, "failed to send vouch ack (stream closed)");
                    }
                    let _ = self.event_tx.send(NetEvent::VouchInbound { peer, message });
                }
            }

            OrdernetBehaviourEvent::Keyex(event) => {
                if let Some((peer, channel, payload)) = inbound_request(event) {
                    if self
                        .swarm
                        .behaviour_mut()
                        .keyex
                        .send_response(channel, Ack)
                        .is_err()
                    {
                        tracing::warn!(%peer, "failed to send key exchange ack (stream closed)");
                    }
                    let _ = self
                        .event_tx
                        .send(NetEvent::KeyExchangeInbound { peer, payload });
                }
            }

            OrdernetBehaviourEvent::Mdns(mdns::Event::Discovered(peers)) => {
                for (peer_id, addr) in peers {
                    tracing::debug!(%peer_id, %addr, "mDNS discovered peer");
                    self.swarm.add_peer_address(peer_id, addr.clone());
                    if let Err(e) = self.swarm.dial(addr) {
                        tracing::debug!(%peer_id, %e, "mDNS dial failed");
                    }
                }
            }
            OrdernetBehaviourEvent::Mdns(mdns::Event::Expired(peers)) => {
                for (peer_id, _) in peers {
                    tracing::trace!(%peer_id, "mDNS record expired");
                }
            }
        }
    }

}

/// Common handling for one-shot request/response protocols: extract the
/// inbound `(peer, response channel, request)` triple and log the rest.
fn inbound_request<T>(
    event: request_response::Event<T, Ack>,
) -> Option<(PeerId, request_response::ResponseChannel<Ack>, T)> {
    match event {
        request_response::Event::Message {
            peer,
            message:
                request_response::Message::Request {
                    request, channel, ..
                },
            ..
        } => Some((peer, channel, request)),

        request_response::Event::Message {
            peer,
            message: request_response::Message::Response { .. },
            ..
        } => {
            tracing::trace!(%peer, "unicast acknowledged");
            None
        }

        request_response::Event::OutboundFailure { peer, error, .. } => {
            tracing::warn!(%peer, ?error, "unicast send failed");
            None
        }

        request_response::Event::InboundFailure { peer, error, .. } => {
            tracing::warn!(%peer, ?error, "unicast receive failed");
            None
        }

        request_response::Event::ResponseSent { peer, .. } => {
            tracing::trace!(%peer, "ack sent");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour construction
// ---------------------------------------------------------------------------

/// Builds the combined [`OrdernetBehaviour`].
fn build_behaviour(
    key: &libp2p::identity::Keypair,
    enable_mdns: bool,
) -> OrdernetResult<OrdernetBehaviour> {
    let gossip_config = gossipsub::ConfigBuilder::default()
        .max_transmit_size(MAX_GOSSIP_SIZE)
        .build()
        .map_err(|e| OrdernetError::TransportError {
            reason: format!("failed to build gossipsub config: {e}"),
        })?;

    let gossip = gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(key.clone()),
        gossip_config,
    )
    .map_err(|e| OrdernetError::TransportError {
        reason: format!("failed to create gossipsub behaviour: {e}"),
    })?;

    let vouch = request_response::json::Behaviour::new(
        [(StreamProtocol::new(VOUCH_PROTOCOL), ProtocolSupport::Full)],
        request_response::Config::default(),
    );

    let keyex = request_response::json::Behaviour::new(
        [(StreamProtocol::new(KEYEX_PROTOCOL), ProtocolSupport::Full)],
        request_response::Config::default(),
    );

    let mdns = Toggle::from(if enable_mdns {
        let behaviour = mdns::tokio::Behaviour::new(
            mdns::Config::default(),
            key.public().to_peer_id(),
        )
        .map_err(|e| OrdernetError::TransportError {
            reason: format!("failed to create mDNS behaviour: {e}"),
        })?;
        Some(behaviour)
    } else {
        None
    });

    Ok(OrdernetBehaviour {
        gossip,
        vouch,
        keyex,
        mdns,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
