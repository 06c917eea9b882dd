use futures_util::{Sink, SinkExt};
use playsync_proto::encode_frame;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

/// Sender used by the server loop to write frames to one connection.
pub type OutboundTx = mpsc::Sender<Message>;

/// Spawn a writer task that drains the outbound queue into the socket.
///
/// Exits when the channel is closed; a write failure ends the task and the
/// read half will observe the broken connection.
pub fn spawn_writer<S>(
    mut write: S,
    mut rx: mpsc::Receiver<Message>,
) -> tokio::task::JoinHandle<anyhow::Result<()>>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            write.send(msg).await?;
        }
        Ok(())
    })
}

/// Encode a frame and queue it on a connection, awaiting queue space.
///
/// Used for direct replies (ack, pong, error). A closed connection is not an
/// error the caller can act on; it is logged and swallowed.
pub async fn send_frame<T: serde::Serialize>(tx: &OutboundTx, frame: &T) {
    match encode_frame(frame) {
        Ok(text) => {
            if tx.send(Message::text(text)).await.is_err() {
                warn!("dropping frame for closed connection");
            }
        }
        Err(err) => warn!(%err, "failed to encode outbound frame"),
    }
}

/// Encode a frame and queue it without blocking.
///
/// Used for room fan-out: a recipient with a full or closed queue is
/// skipped, never blocking the sender. The liveness sweep deals with peers
/// that stay unresponsive.
pub fn try_send_frame<T: serde::Serialize>(tx: &OutboundTx, frame: &T) {
    match encode_frame(frame) {
        Ok(text) => {
            let _ = tx.try_send(Message::text(text));
        }
        Err(err) => warn!(%err, "failed to encode outbound frame"),
    }
}
