//! Application-level ping, answered with the relay clock.

use playsync_proto::{ServerFrame, epoch_ms};

use crate::ConnCtx;
use crate::net::outbound::send_frame;

pub(crate) async fn handle(ctx: &ConnCtx) {
    send_frame(
        &ctx.outbound,
        &ServerFrame::Pong {
            server_time: epoch_ms(),
        },
    )
    .await;
}
