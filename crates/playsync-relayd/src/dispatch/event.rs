//! Event and heartbeat fan-out.

use playsync_proto::{ErrorCode, EventBody, RelayedEvent, ServerFrame, epoch_ms};

use super::send_error;
use crate::ConnCtx;
use crate::net::inbound::ConnId;
use crate::net::outbound::try_send_frame;
use crate::room::registry::RoomRegistry;

pub(crate) async fn handle(
    ctx: &mut ConnCtx,
    conn_id: ConnId,
    registry: &mut RoomRegistry,
    body: EventBody,
    heartbeat: bool,
) {
    let Some(room) = registry.room_of(conn_id).map(str::to_string) else {
        send_error(ctx, ErrorCode::NotJoined, "join a room first").await;
        return;
    };

    let now = epoch_ms();
    let relayed = RelayedEvent {
        action: body.action,
        state: body.state,
        room: room.clone(),
        client_id: ctx.client_id.clone(),
        nickname: ctx.nickname.clone(),
        sent_at: Some(body.sent_at.unwrap_or(now)),
        // Relay clock only; any client-supplied value is ignored.
        server_time: Some(now),
    };
    let frame = if heartbeat {
        ServerFrame::Heartbeat(relayed)
    } else {
        ServerFrame::Event(relayed)
    };

    // Fire-and-forget per recipient: a blocked or closed peer is skipped.
    for tx in &registry.broadcast_targets(&room, conn_id) {
        try_send_frame(tx, &frame);
    }
}
