//! Join handling: room registration, ack, and presence fan-out.

use playsync_proto::{ErrorCode, PresenceAction, ServerFrame, epoch_ms};
use tracing::info;

use super::send_error;
use crate::ConnCtx;
use crate::net::inbound::ConnId;
use crate::net::outbound::{send_frame, try_send_frame};
use crate::room::registry::{Member, RoomRegistry};

pub(crate) async fn handle(
    ctx: &mut ConnCtx,
    conn_id: ConnId,
    registry: &mut RoomRegistry,
    room: String,
    client_id: String,
    nickname: String,
) {
    let room = room.trim().to_string();
    if room.is_empty() {
        send_error(ctx, ErrorCode::MissingRoom, "room is required").await;
        return;
    }

    // Keep the connection-scoped identity assigned at accept time unless
    // the client brought its own.
    let client_id = client_id.trim();
    if !client_id.is_empty() {
        ctx.client_id = client_id.to_string();
    }
    let nickname = nickname.trim();
    ctx.nickname = if nickname.is_empty() {
        "anonymous".to_string()
    } else {
        nickname.to_string()
    };

    let member = Member {
        client_id: ctx.client_id.clone(),
        nickname: ctx.nickname.clone(),
        outbound: ctx.outbound.clone(),
    };
    let (departure, roster) = registry.join(conn_id, &room, member);

    // The implicit leave notifies whoever stayed behind in the old room.
    if let Some(dep) = departure
        && !dep.remaining.is_empty()
    {
        let notice = ServerFrame::Presence {
            action: PresenceAction::Leave,
            client_id: dep.member.client_id.clone(),
            nickname: dep.member.nickname.clone(),
            clients: dep.roster,
            server_time: epoch_ms(),
        };
        for tx in &dep.remaining {
            try_send_frame(tx, &notice);
        }
    }

    send_frame(
        &ctx.outbound,
        &ServerFrame::Ack {
            room: room.clone(),
            client_id: ctx.client_id.clone(),
            nickname: ctx.nickname.clone(),
            clients: roster.clone(),
            server_time: epoch_ms(),
        },
    )
    .await;

    let notice = ServerFrame::Presence {
        action: PresenceAction::Join,
        client_id: ctx.client_id.clone(),
        nickname: ctx.nickname.clone(),
        clients: roster,
        server_time: epoch_ms(),
    };
    for tx in &registry.broadcast_targets(&room, conn_id) {
        try_send_frame(tx, &notice);
    }

    info!(
        room,
        client_id = %ctx.client_id,
        nickname = %ctx.nickname,
        "peer joined room"
    );
}
