use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::outbound::OutboundTx;

/// Unique connection identifier assigned by the server.
pub type ConnId = u64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_conn_id() -> ConnId {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Inbound events produced by the network layer.
///
/// - `Connected` is emitted once per accepted connection, with an
///   `OutboundTx` that the server loop uses to send frames back and a
///   cancellation token that forcibly terminates the transport.
/// - `Frame` is emitted for every text payload received.
/// - `Pong` is emitted when the peer answers a liveness ping.
/// - `Disconnected` is emitted when the connection handler exits.
#[derive(Debug)]
pub enum InboundEvent {
    Connected {
        conn_id: ConnId,
        peer: SocketAddr,
        outbound: OutboundTx,
        cancel_token: CancellationToken,
    },

    Frame {
        conn_id: ConnId,
        peer: SocketAddr,
        text: String,
    },

    Pong {
        conn_id: ConnId,
    },

    Disconnected {
        conn_id: ConnId,
        peer: SocketAddr,
        /// Best-effort human-readable reason (logging/debug).
        reason: String,
    },
}

pub type InboundTx = mpsc::Sender<InboundEvent>;
