//! libp2p transport adapter for the OrderNet node.
//!
//! The node core treats the transport as two primitives: topic-based
//! pub/sub (gossipsub) and one-shot JSON unicast (request/response).
//! This crate wires those up over TCP + Noise + Yamux, with optional
//! mDNS LAN discovery, and converts everything into [`events::NetEvent`]
//! values on a channel. Protocol semantics live in `ordernet-node`;
//! nothing here inspects payload contents beyond codec framing.

pub mod config;
pub mod events;
pub mod identity;
pub mod swarm;

pub use config::NetConfig;
pub use events::NetEvent;
pub use swarm::OrdernetSwarm;
