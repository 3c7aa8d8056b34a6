//! Main event loop driving all node subsystems.
//!
//! [`run_event_loop`] is spawned as a tokio task by `Node::start`. It
//! multiplexes with `tokio::select!`:
//!
//! 1. **Swarm poll** — drives libp2p event processing.
//! 2. **Network events** — gossip payloads, unicast envelopes.
//! 3. **Commands** — from the façade's command channel.
//! 4. **Presence tick** — our own announcement every 30 s.
//! 5. **Shutdown signal** — graceful exit via `watch` channel.
//!
//! All protocol and store mutation happens in synchronous handlers
//! that return the events to emit; the loop awaits emission afterward.
//! That keeps every non-`Sync` resource (the SQLite connection, the
//! swarm) out of scope across await points, and serializes all state
//! mutation on this one task — the single-logical-executor model the
//! protocols assume.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use ordernet_net::{identity as net_identity, NetEvent, OrdernetSwarm};
use ordernet_proto::invite;
use ordernet_proto::topics;
use ordernet_proto::vouch::VouchMessage;
use ordernet_store::Database;
use ordernet_types::{now_millis, AccessMode, NodeEvent, OrdernetError, Result};

use crate::channels::{ChannelManager, ChannelOverrides};
use crate::chat;
use crate::command::{NodeCommand, NodeStatus};
use crate::identity::IdentityManager;
use crate::keyex;
use crate::presence::{self, PresenceTable, ANNOUNCE_INTERVAL_SECS};
use crate::trust;
use crate::vouch::{self, VouchOutcome};

// ---------------------------------------------------------------------------
// NodeRuntime
// ---------------------------------------------------------------------------

/// Owned runtime state moved into the event loop task.
pub(crate) struct NodeRuntime {
    pub identity: IdentityManager,
    pub channels: ChannelManager,
    pub presence: PresenceTable,
    pub store: Database,
    pub swarm: OrdernetSwarm,
    pub net_rx: mpsc::UnboundedReceiver<NetEvent>,
    pub event_tx: mpsc::Sender<NodeEvent>,
    pub command_rx: mpsc::Receiver<NodeCommand>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub bootstrap: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Runs the node event loop until shutdown is signalled.
pub(crate) async fn run_event_loop(mut rt: NodeRuntime) {
    tracing::info!("node event loop starting");

    // Subscribe to presence plus every joined channel's topic.
    if let Err(e) = rt.swarm.subscribe(topics::PRESENCE_TOPIC) {
        tracing::error!(%e, "failed to subscribe to presence topic");
    }
    for id in rt.channels.channel_ids() {
        if let Err(e) = rt.swarm.subscribe(&topics::chat_topic(&id)) {
            tracing::warn!(channel = %id, %e, "failed to subscribe to chat topic");
        }
    }

    // Bootstrap dials are best-effort; discovery continues without.
    for addr in rt.bootstrap.clone() {
        match addr.parse() {
            Ok(multiaddr) => {
                if let Err(e) = rt.swarm.dial(multiaddr) {
                    tracing::warn!(%addr, %e, "bootstrap dial failed");
                }
            }
            Err(e) => tracing::warn!(%addr, %e, "invalid bootstrap multiaddr"),
        }
    }

    let mut presence_tick =
        tokio::time::interval(Duration::from_secs(ANNOUNCE_INTERVAL_SECS));

    loop {
        tokio::select! {
            // Drive the swarm; resulting events arrive on net_rx.
            _ = rt.swarm.poll_next() => {}

            Some(event) = rt.net_rx.recv() => {
                let events = handle_net_event(&mut rt, event);
                emit_all(&rt.event_tx, events).await;
            }

            Some(cmd) = rt.command_rx.recv() => {
                let (events, shutdown) = handle_command(&mut rt, cmd);
                emit_all(&rt.event_tx, events).await;
                if shutdown {
                    tracing::info!("shutdown command received");
                    break;
                }
            }

            _ = presence_tick.tick() => {
                announce_presence(&mut rt);
            }

            _ = rt.shutdown_rx.changed() => {
                if *rt.shutdown_rx.borrow() {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
        }
    }

    // Graceful teardown: stop announcing, leave all topics; the swarm
    // and database close when the runtime drops.
    rt.swarm.unsubscribe(topics::PRESENCE_TOPIC);
    for id in rt.channels.channel_ids() {
        rt.swarm.unsubscribe(&topics::chat_topic(&id));
    }
    tracing::info!("node event loop exited");
}

/// Emits a batch of events; a closed consumer is logged, not fatal.
async fn emit_all(event_tx: &mpsc::Sender<NodeEvent>, events: Vec<NodeEvent>) {
    for event in events {
        if event_tx.send(event).await.is_err() {
            tracing::warn!("node event channel closed, consumer dropped");
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Presence announcement
// ---------------------------------------------------------------------------

/// Publishes this node's signed presence announcement.
fn announce_presence(rt: &mut NodeRuntime) {
    let announcement = match presence::build_announcement(&rt.identity, &rt.channels, now_millis())
    {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(%e, "failed to build presence announcement");
            return;
        }
    };

    match announcement.to_bytes() {
        Ok(bytes) => {
            // Publishing into an empty mesh is routine at startup.
            if let Err(e) = rt.swarm.publish(topics::PRESENCE_TOPIC, bytes) {
                tracing::debug!(%e, "presence publish skipped");
            }
        }
        Err(e) => tracing::warn!(%e, "failed to serialize presence announcement"),
    }
}

// ---------------------------------------------------------------------------
// Network event handling
// ---------------------------------------------------------------------------

/// Dispatches one transport event. Returns the node events to emit.
///
/// Every failure inside is contained here: inbound handlers log and
/// drop, keeping the node running (nothing propagates to peers).
fn handle_net_event(rt: &mut NodeRuntime, event: NetEvent) -> Vec<NodeEvent> {
    match event {
        NetEvent::Gossip { topic, data, .. } => handle_gossip(rt, &topic, &data),

        NetEvent::VouchInbound { peer, message } => {
            match vouch::process_vouch_message(&rt.store, &rt.channels, message) {
                Ok(outcome) => handle_vouch_outcome(rt, outcome),
                Err(e) => {
                    tracing::debug!(%peer, %e, "vouch envelope dropped");
                    Vec::new()
                }
            }
        }

        NetEvent::KeyExchangeInbound { peer, payload } => {
            match keyex::process_key_exchange(&rt.identity, &mut rt.channels, &rt.store, &payload)
            {
                Ok(Some(channel_id)) => {
                    if let Err(e) = rt.swarm.subscribe(&topics::chat_topic(&channel_id)) {
                        tracing::warn!(channel = %channel_id, %e, "chat subscribe failed");
                    }
                    vec![NodeEvent::KeyReceived { channel_id }]
                }
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::debug!(%peer, %e, "key exchange payload dropped");
                    Vec::new()
                }
            }
        }

        NetEvent::PeerConnected(peer_id) => {
            tracing::debug!(%peer_id, "transport peer connected");
            Vec::new()
        }

        NetEvent::PeerDisconnected(peer_id) => {
            tracing::debug!(%peer_id, "transport peer disconnected");
            Vec::new()
        }
    }
}

/// Handles one gossip payload: presence or chat by topic.
fn handle_gossip(rt: &mut NodeRuntime, topic: &str, data: &[u8]) -> Vec<NodeEvent> {
    if topic == topics::PRESENCE_TOPIC {
        let self_hex = rt.identity.public_hex();
        return match presence::process_announcement(data, &self_hex, &mut rt.presence, &rt.store)
        {
            Ok(Some(outcome)) => {
                let mut events = Vec::new();
                let pubkey = outcome.announcement.pub_key.to_hex();
                if outcome.first_seen {
                    events.push(NodeEvent::PeerJoined {
                        pubkey: pubkey.clone(),
                        nickname: outcome.announcement.nickname.clone(),
                    });
                }
                events.push(NodeEvent::Presence {
                    pubkey,
                    nickname: outcome.announcement.nickname,
                    channels: outcome.announcement.channels,
                });
                events
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::debug!(%e, "presence announcement dropped");
                Vec::new()
            }
        };
    }

    match chat::process_incoming(topic, data, &rt.channels, &rt.store) {
        Ok(Some(plain)) => {
            rt.channels
                .add_member(&plain.channel_id, &plain.sender_pubkey);

            let is_dm = rt
                .channels
                .get(&plain.channel_id)
                .map(|s| s.config.access_mode == AccessMode::Dm)
                .unwrap_or(false);

            if is_dm {
                vec![NodeEvent::Dm { plain }]
            } else {
                vec![NodeEvent::Message { plain }]
            }
        }
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::debug!(%topic, %e, "chat payload dropped");
            Vec::new()
        }
    }
}

/// Reacts to a processed vouch envelope. Approval closes the loop: the
/// newly approved vouchee gets the channel key over unicast.
fn handle_vouch_outcome(rt: &mut NodeRuntime, outcome: VouchOutcome) -> Vec<NodeEvent> {
    match outcome {
        VouchOutcome::JoinRequested {
            requester_hex,
            nickname,
            channel_id,
        } => vec![NodeEvent::JoinRequest {
            requester_pubkey: requester_hex,
            nickname,
            channel_id,
        }],

        VouchOutcome::VouchRecorded { vouch, threshold } => {
            let mut events = vec![NodeEvent::VouchReceived {
                voucher_pubkey: vouch.voucher_pub_key.to_hex(),
                vouchee_pubkey: vouch.vouchee_pub_key.to_hex(),
                channel_id: vouch.channel_id.clone(),
            }];

            if threshold.map(|t| t.approved).unwrap_or(false) {
                events.push(NodeEvent::ChannelJoined {
                    channel_id: vouch.channel_id.clone(),
                    member_pubkey: vouch.vouchee_pub_key.to_hex(),
                });
                send_group_key(rt, &vouch.channel_id, &vouch.vouchee_pub_key);
            }

            events
        }
    }
}

/// Wraps and unicasts a channel's group key to a recipient.
fn send_group_key(
    rt: &mut NodeRuntime,
    channel_id: &str,
    recipient: &ordernet_crypto::signing::PublicKey,
) {
    let payload = match keyex::build_key_exchange(&rt.identity, &rt.channels, channel_id, recipient)
    {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(channel = %channel_id, %e, "failed to build key exchange");
            return;
        }
    };

    match net_identity::peer_id_from_public_key(recipient) {
        Ok(peer_id) => rt.swarm.send_keyex(&peer_id, payload),
        Err(e) => tracing::warn!(%e, "cannot derive peer id for key exchange recipient"),
    }
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

/// Processes one command. Returns the events to emit and whether the
/// loop should exit.
fn handle_command(rt: &mut NodeRuntime, cmd: NodeCommand) -> (Vec<NodeEvent>, bool) {
    let mut events = Vec::new();

    match cmd {
        NodeCommand::SendMessage {
            channel_id,
            content,
            reply,
        } => {
            let result = send_message(rt, &channel_id, &content, &mut events);
            let _ = reply.send(result);
        }

        NodeCommand::CreateChannel {
            name,
            threshold,
            reply,
        } => {
            let result = rt
                .channels
                .create_channel(&rt.store, &name, threshold, ChannelOverrides::default())
                .map(|state| state.config.clone());
            if let Ok(config) = &result {
                subscribe_chat(rt, &config.id);
            }
            let _ = reply.send(result);
        }

        NodeCommand::CreatePrivateChannel {
            name,
            allowed,
            threshold,
            reply,
        } => {
            let result = rt
                .channels
                .create_private_channel(&rt.store, &name, allowed, threshold)
                .map(|state| state.config.clone());
            if let Ok(config) = &result {
                subscribe_chat(rt, &config.id);
            }
            let _ = reply.send(result);
        }

        NodeCommand::CreateDm { peer_pubkey, reply } => {
            let result = rt
                .channels
                .create_dm_channel(&rt.store, &peer_pubkey)
                .map(|state| state.config.clone());
            if let Ok(config) = &result {
                subscribe_chat(rt, &config.id);
            }
            let _ = reply.send(result);
        }

        NodeCommand::LeaveChannel { channel_id, reply } => {
            rt.swarm.unsubscribe(&topics::chat_topic(&channel_id));
            let _ = reply.send(rt.channels.leave_channel(&rt.store, &channel_id));
        }

        NodeCommand::InviteMember {
            channel_id,
            peer_pubkey,
            reply,
        } => {
            let _ = reply.send(rt.channels.invite_member(&rt.store, &channel_id, &peer_pubkey));
        }

        NodeCommand::InviteCode { channel_id, reply } => {
            let result = match rt.channels.get(&channel_id) {
                Some(state) => invite::encode_invite(&state.config, &state.group_key),
                None => Err(OrdernetError::ConfigError {
                    reason: format!("unknown channel '{channel_id}'"),
                }),
            };
            let _ = reply.send(result);
        }

        NodeCommand::AcceptInvite { code, reply } => {
            let result = match invite::decode_invite(&code) {
                None => Ok(None),
                Some((config, group_key)) => rt
                    .channels
                    .join_channel(&rt.store, config, group_key)
                    .map(|state| Some(state.config.clone())),
            };
            if let Ok(Some(config)) = &result {
                subscribe_chat(rt, &config.id);
            }
            let _ = reply.send(result);
        }

        NodeCommand::RequestJoin {
            channel_id,
            via_pubkey,
            reply,
        } => {
            let _ = reply.send(request_join(rt, &channel_id, &via_pubkey));
        }

        NodeCommand::Vouch {
            vouchee_pubkey,
            channel_id,
            reply,
        } => {
            let result = vouch_for(rt, &vouchee_pubkey, &channel_id, &mut events);
            let _ = reply.send(result);
        }

        NodeCommand::GetOnlinePeers { reply } => {
            let (snapshot, pruned) = rt.presence.get_online_peers(now_millis());
            for pubkey in pruned {
                events.push(NodeEvent::PeerLeft { pubkey });
            }
            let _ = reply.send(snapshot);
        }

        NodeCommand::GetTrustGraph { channel_id, reply } => {
            let _ = reply.send(trust::trust_graph(&rt.store, &channel_id));
        }

        NodeCommand::GetHistory {
            channel_id,
            limit,
            reply,
        } => {
            let _ = reply.send(chat::channel_history(
                &rt.channels,
                &rt.store,
                &channel_id,
                limit,
            ));
        }

        NodeCommand::SetNickname { nickname, reply } => {
            let _ = reply.send(rt.identity.set_nickname(&rt.store, &nickname));
        }

        NodeCommand::Dial { addr, reply } => {
            let result = addr
                .parse()
                .map_err(|e| OrdernetError::TransportError {
                    reason: format!("invalid multiaddr '{addr}': {e}"),
                })
                .and_then(|multiaddr| rt.swarm.dial(multiaddr));
            let _ = reply.send(result);
        }

        NodeCommand::GetStatus { reply } => {
            let status = NodeStatus {
                pubkey: rt.identity.public_hex(),
                fingerprint: rt.identity.fingerprint(),
                nickname: rt.identity.nickname().to_string(),
                peer_id: rt.swarm.local_peer_id().to_string(),
                listeners: rt.swarm.listeners().iter().map(|a| a.to_string()).collect(),
                channels: rt.channels.channel_ids(),
                online_peers: rt.presence.len(),
            };
            let _ = reply.send(status);
        }

        NodeCommand::Shutdown => return (events, true),
    }

    (events, false)
}

/// Subscribes the swarm to a channel's chat topic.
fn subscribe_chat(rt: &mut NodeRuntime, channel_id: &str) {
    if let Err(e) = rt.swarm.subscribe(&topics::chat_topic(channel_id)) {
        tracing::warn!(channel = %channel_id, %e, "chat subscribe failed");
    }
}

/// Send path: seal, persist, publish. Access denial is refused with an
/// `error` event; a publish failure (e.g. empty mesh) still succeeds
/// locally.
fn send_message(
    rt: &mut NodeRuntime,
    channel_id: &str,
    content: &str,
    events: &mut Vec<NodeEvent>,
) -> Result<ordernet_types::PlainMessage> {
    let (envelope, plain) = match chat::seal_message(&rt.identity, &rt.channels, channel_id, content)
    {
        Ok(pair) => pair,
        Err(e) => {
            events.push(NodeEvent::Error {
                reason: e.to_string(),
            });
            return Err(e);
        }
    };

    if let Err(e) = rt.store.insert_message(&envelope) {
        events.push(NodeEvent::Error {
            reason: e.to_string(),
        });
        return Err(e);
    }

    let bytes = envelope.to_bytes()?;
    if let Err(e) = rt.swarm.publish(&topics::chat_topic(channel_id), bytes) {
        tracing::debug!(channel = %channel_id, %e, "chat publish deferred to mesh formation");
        events.push(NodeEvent::Error {
            reason: e.to_string(),
        });
    }

    Ok(plain)
}

/// Sends a join request for `channel_id` to a known member.
fn request_join(rt: &mut NodeRuntime, channel_id: &str, via_pubkey: &str) -> Result<()> {
    let via = ordernet_crypto::signing::PublicKey::from_hex(via_pubkey)?;
    let peer_id = net_identity::peer_id_from_public_key(&via)?;

    let message = VouchMessage::JoinRequest {
        requester_pub_key: rt.identity.public_key(),
        nickname: rt.identity.nickname().to_string(),
        channel_id: channel_id.to_string(),
        timestamp: now_millis(),
    };

    rt.swarm.send_vouch(&peer_id, message);
    Ok(())
}

/// Creates and saves our vouch, evaluates the threshold locally, and
/// forwards the vouch to the channel creator so their count converges.
fn vouch_for(
    rt: &mut NodeRuntime,
    vouchee_pubkey: &str,
    channel_id: &str,
    events: &mut Vec<NodeEvent>,
) -> Result<Option<trust::ThresholdResult>> {
    let vouchee = ordernet_crypto::signing::PublicKey::from_hex(vouchee_pubkey)?;

    let vouch = trust::create_vouch(rt.identity.keypair(), vouchee, channel_id, &rt.store)?;

    let threshold = trust::process_vouch_and_check_threshold(
        &rt.store,
        &rt.channels,
        &vouchee.to_hex(),
        channel_id,
    )?;

    if threshold.map(|t| t.approved).unwrap_or(false) {
        events.push(NodeEvent::ChannelJoined {
            channel_id: channel_id.to_string(),
            member_pubkey: vouchee.to_hex(),
        });
        send_group_key(rt, channel_id, &vouchee);
    }

    // Forward to the channel creator (the natural evaluator) unless
    // that is us.
    if let Some(state) = rt.channels.get(channel_id) {
        let creator_hex = state.config.creator_pubkey.clone();
        if creator_hex != rt.channels.self_hex() {
            match ordernet_crypto::signing::PublicKey::from_hex(&creator_hex)
                .and_then(|pk| net_identity::peer_id_from_public_key(&pk))
            {
                Ok(peer_id) => {
                    rt.swarm
                        .send_vouch(&peer_id, VouchMessage::from_vouch(vouch));
                }
                Err(e) => tracing::warn!(%e, "cannot address channel creator for vouch forward"),
            }
        }
    }

    Ok(threshold)
}
