//! Node lifecycle and façade.
//!
//! [`Node`] is the public entry point for the OrderNet runtime. It
//! owns all subsystems and exposes a channel-based API to external
//! consumers.
//!
//! # State machine
//!
//! ```text
//! Initializing ──start()──▶ Running ──shutdown()──▶ ShuttingDown ──▶ (dropped)
//! ```
//!
//! - `Initializing` — components created, not yet listening.
//! - `Running` — event loop active, processing events and commands.
//! - `ShuttingDown` — draining in-flight work.
//!
//! Double-start is rejected; `shutdown()` is idempotent and safe to
//! call from a signal handler path.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use ordernet_net::{NetConfig, OrdernetSwarm};
use ordernet_store::Database;
use ordernet_types::config::NodeConfig;
use ordernet_types::{NodeEvent, OrdernetError, Result};

use crate::channels::ChannelManager;
use crate::command::NodeCommand;
use crate::event_loop::{self, NodeRuntime};
use crate::identity::IdentityManager;
use crate::presence::PresenceTable;

// ---------------------------------------------------------------------------
// Channel buffer sizes
// ---------------------------------------------------------------------------

/// Bounded command channel capacity. Callers feel backpressure if the
/// event loop is overloaded.
const COMMAND_CHANNEL_SIZE: usize = 256;

/// Bounded node event channel capacity. Larger, to absorb bursts of
/// inbound messages without stalling the event loop.
const EVENT_CHANNEL_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// NodeState
// ---------------------------------------------------------------------------

/// Lifecycle state of the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    /// Components created, event loop not started.
    Initializing,
    /// Event loop is active.
    Running,
    /// Graceful shutdown in progress.
    ShuttingDown,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// OrderNet node — owns all subsystems and drives the event loop.
///
/// After construction via [`Node::new`], call [`Node::start`] to spawn
/// the event loop, then interact through the channels:
///
/// - Send [`NodeCommand`]s via [`Node::command_sender`].
/// - Receive [`NodeEvent`]s via [`Node::take_event_receiver`].
/// - Stop via [`Node::shutdown`] (or `NodeCommand::Shutdown`).
pub struct Node {
    state: NodeState,

    /// Runtime moved into the event loop on `start()`.
    runtime: Option<NodeRuntime>,

    command_tx: mpsc::Sender<NodeCommand>,

    /// `None` after taken by the consumer.
    event_rx: Option<mpsc::Receiver<NodeEvent>>,

    shutdown_tx: watch::Sender<bool>,

    // Identity facts captured at construction for cheap access.
    pubkey_hex: String,
    fingerprint: String,
    nickname: String,
}

impl Node {
    /// Creates a new node: opens the store, unlocks or creates the
    /// identity, loads channels, and builds the swarm.
    ///
    /// # Errors
    ///
    /// - [`OrdernetError::IdentityLocked`] when the passphrase cannot
    ///   decrypt a stored identity — fatal at start.
    /// - [`OrdernetError::StorageError`] / [`OrdernetError::TransportError`]
    ///   on store or swarm construction failures.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let db_path = config.resolved_db_path()?;
        let store = Database::open_at(&db_path)?;

        let identity = IdentityManager::load_or_create(
            &store,
            config.effective_passphrase(),
            config.nickname.as_deref(),
        )?;

        let channels = ChannelManager::load(&store, &identity.public_hex())?;

        let net_config = NetConfig {
            listen_port: config.listen_port,
            enable_mdns: config.enable_mdns,
            ..NetConfig::default()
        };
        let (mut swarm, net_rx) = OrdernetSwarm::new(&net_config, identity.keypair())?;

        let listen_addr = net_config
            .listen_addr()
            .parse()
            .map_err(|e| OrdernetError::TransportError {
                reason: format!("invalid listen address: {e}"),
            })?;
        swarm.start_listening(listen_addr)?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pubkey_hex = identity.public_hex();
        let fingerprint = identity.fingerprint();
        let nickname = identity.nickname().to_string();

        let runtime = NodeRuntime {
            identity,
            channels,
            presence: PresenceTable::default(),
            store,
            swarm,
            net_rx,
            event_tx,
            command_rx,
            shutdown_rx,
            bootstrap: config.bootstrap,
        };

        Ok(Self {
            state: NodeState::Initializing,
            runtime: Some(runtime),
            command_tx,
            event_rx: Some(event_rx),
            shutdown_tx,
            pubkey_hex,
            fingerprint,
            nickname,
        })
    }

    /// Spawns the event loop. Transitions `Initializing → Running` and
    /// returns the task handle; await it to observe loop exit.
    ///
    /// # Errors
    ///
    /// Rejects double-start with [`OrdernetError::ConfigError`].
    pub fn start(&mut self) -> Result<JoinHandle<()>> {
        if self.state != NodeState::Initializing {
            return Err(OrdernetError::ConfigError {
                reason: format!("cannot start node in state '{}'", self.state),
            });
        }

        let runtime = self.runtime.take().ok_or_else(|| OrdernetError::ConfigError {
            reason: "runtime already consumed".into(),
        })?;

        let handle = tokio::spawn(event_loop::run_event_loop(runtime));
        self.state = NodeState::Running;
        Ok(handle)
    }

    /// Signals the event loop to exit. Idempotent; safe from the
    /// signal path.
    pub fn shutdown(&mut self) {
        if self.state == NodeState::Running {
            self.state = NodeState::ShuttingDown;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns a cloneable sender for submitting commands.
    pub fn command_sender(&self) -> mpsc::Sender<NodeCommand> {
        self.command_tx.clone()
    }

    /// Takes the event receiver. Returns `None` if already taken.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<NodeEvent>> {
        self.event_rx.take()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Lowercase hex of the node's public key.
    pub fn pubkey_hex(&self) -> &str {
        &self.pubkey_hex
    }

    /// Short fingerprint of the public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Nickname at construction time.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
