//! Frame dispatch: decodes inbound payloads and routes them to handlers.

use std::net::SocketAddr;

use playsync_proto::{ClientFrame, ErrorBody, ServerFrame, decode_client_frame};
use tracing::debug;

use crate::ConnCtx;
use crate::net::inbound::ConnId;
use crate::net::outbound::send_frame;
use crate::room::registry::RoomRegistry;

mod event;
mod join;
mod ping;

pub(crate) async fn dispatch_frame(
    ctx: &mut ConnCtx,
    conn_id: ConnId,
    peer: &SocketAddr,
    registry: &mut RoomRegistry,
    text: &str,
) {
    let frame = match decode_client_frame(text) {
        Ok(frame) => frame,
        Err(err) => {
            // Protocol violation: reply with a structured error, keep the
            // connection open.
            debug!(conn_id, %peer, %err, "rejected inbound frame");
            send_error(ctx, err.error_code(), &err.to_string()).await;
            return;
        }
    };

    match frame {
        ClientFrame::Join {
            room,
            client_id,
            nickname,
        } => join::handle(ctx, conn_id, registry, room, client_id, nickname).await,
        ClientFrame::Event(body) => event::handle(ctx, conn_id, registry, body, false).await,
        ClientFrame::Heartbeat(body) => event::handle(ctx, conn_id, registry, body, true).await,
        ClientFrame::Ping => ping::handle(ctx).await,
    }
}

pub(crate) async fn send_error(ctx: &ConnCtx, code: playsync_proto::ErrorCode, message: &str) {
    send_frame(
        &ctx.outbound,
        &ServerFrame::Error {
            error: ErrorBody {
                code,
                message: message.to_string(),
            },
        },
    )
    .await;
}
