//! Relay server library - main loop logic extracted for testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use playsync_proto::{PresenceAction, ServerFrame, epoch_ms};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::dispatch_frame;
use crate::net::inbound::{ConnId, InboundEvent};
use crate::net::outbound::{OutboundTx, try_send_frame};
use crate::room::registry::RoomRegistry;

pub mod dispatch;
pub mod net;
pub mod room;

/// Per-connection server-side context.
pub struct ConnCtx {
    pub outbound: OutboundTx,
    pub cancel_token: CancellationToken,
    pub peer: SocketAddr,
    /// Assigned at accept time, overridden by the client's own id on join.
    pub client_id: String,
    pub nickname: String,
    /// Answered the previous liveness ping.
    alive: bool,
}

/// Configuration for the liveness sweep.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// How often to ping connections and evict the ones that stayed silent.
    pub sweep_interval: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
        }
    }
}

fn generated_client_id() -> String {
    format!("client-{:016x}", rand::random::<u64>())
}

/// Run the relay main loop.
///
/// This is the core server logic, extracted for testability. The room table
/// is owned by this single task; no two operations on a room interleave.
///
/// If `liveness` is `None`, the ping/evict sweep is disabled.
pub async fn run_relay(
    mut rx: mpsc::Receiver<InboundEvent>,
    liveness: Option<LivenessConfig>,
) -> anyhow::Result<()> {
    let mut conns: HashMap<ConnId, ConnCtx> = HashMap::new();
    let mut registry = RoomRegistry::new();

    let sweep_enabled = liveness.is_some();
    let sweep_interval = liveness
        .map(|c| c.sweep_interval)
        .unwrap_or(Duration::from_secs(3600));
    let mut sweep_timer = tokio::time::interval(sweep_interval);

    info!("relay main loop started");

    loop {
        tokio::select! {
            ev = rx.recv() => {
                let Some(ev) = ev else {
                    break;
                };
                match ev {
                    InboundEvent::Connected { conn_id, peer, outbound, cancel_token } => {
                        conns.insert(conn_id, ConnCtx {
                            outbound,
                            cancel_token,
                            peer,
                            client_id: generated_client_id(),
                            nickname: "anonymous".to_string(),
                            alive: true,
                        });
                        debug!(conn_id, %peer, "client connected");
                    }

                    InboundEvent::Frame { conn_id, peer, text } => {
                        let Some(ctx) = conns.get_mut(&conn_id) else {
                            continue;
                        };
                        dispatch_frame(ctx, conn_id, &peer, &mut registry, &text).await;
                    }

                    InboundEvent::Pong { conn_id } => {
                        if let Some(ctx) = conns.get_mut(&conn_id) {
                            ctx.alive = true;
                        }
                    }

                    InboundEvent::Disconnected { conn_id, peer, reason } => {
                        broadcast_departure(&mut registry, conn_id);
                        conns.remove(&conn_id);
                        info!(conn_id, %peer, %reason, "client disconnected");
                    }
                }
            }
            _ = sweep_timer.tick(), if sweep_enabled => {
                sweep_liveness(&mut conns, &mut registry);
            }
        }
    }

    Ok(())
}

/// Remove a connection from its room and notify remaining members.
///
/// Safe to call for connections that never joined or already left.
fn broadcast_departure(registry: &mut RoomRegistry, conn_id: ConnId) {
    let Some(dep) = registry.leave(conn_id) else {
        return;
    };
    if dep.remaining.is_empty() {
        debug!(room = %dep.room_id, "removed empty room");
        return;
    }
    let notice = ServerFrame::Presence {
        action: PresenceAction::Leave,
        client_id: dep.member.client_id,
        nickname: dep.member.nickname,
        clients: dep.roster,
        server_time: epoch_ms(),
    };
    for tx in &dep.remaining {
        try_send_frame(tx, &notice);
    }
}

/// Evict connections that never answered the previous ping, then ping the
/// survivors. Bounds room membership staleness to one sweep interval.
fn sweep_liveness(conns: &mut HashMap<ConnId, ConnCtx>, registry: &mut RoomRegistry) {
    let dead: Vec<ConnId> = conns
        .iter()
        .filter(|(_, ctx)| !ctx.alive)
        .map(|(&id, _)| id)
        .collect();

    for conn_id in dead {
        if let Some(ctx) = conns.remove(&conn_id) {
            warn!(conn_id, peer = %ctx.peer, "evicting unresponsive connection");
            broadcast_departure(registry, conn_id);
            // The connection task observes the token and tears the
            // transport down; its Disconnected event is then a no-op here.
            ctx.cancel_token.cancel();
        }
    }

    for ctx in conns.values_mut() {
        ctx.alive = false;
        let _ = ctx.outbound.try_send(Message::Ping(Bytes::new()));
    }
}
