//! WebSocket accept loop and per-connection tasks.
//!
//! Each accepted connection gets a reader task (this module) and a writer
//! task ([`spawn_writer`]). Decoded text frames and connection events are
//! forwarded to the server loop over one `mpsc` channel. With a TLS
//! acceptor configured, connections are wrapped before the WebSocket
//! handshake and the relay serves `wss://`.

use std::net::SocketAddr;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::inbound::{InboundEvent, InboundTx, next_conn_id};
use super::outbound::spawn_writer;
use super::tls::TlsAcceptor;

/// Capacity of each connection's outbound queue.
const OUTBOUND_QUEUE: usize = 256;

/// Run the accept loop on an existing listener.
///
/// With `tls_acceptor` set, every connection is TLS-terminated before the
/// WebSocket handshake.
pub async fn run_ws_listener(
    listener: TcpListener,
    tx: InboundTx,
    tls_acceptor: Option<TlsAcceptor>,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let conn_id = next_conn_id();
        let tx_clone = tx.clone();
        match tls_acceptor.clone() {
            Some(acceptor) => {
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            handle_ws_connection(tls_stream, peer, conn_id, tx_clone).await;
                        }
                        Err(err) => warn!(%peer, %err, "TLS handshake failed"),
                    }
                });
            }
            None => {
                tokio::spawn(async move {
                    handle_ws_connection(stream, peer, conn_id, tx_clone).await;
                });
            }
        }
    }
}

/// Handle a single connection from handshake to close.
pub async fn handle_ws_connection<S>(stream: S, peer: SocketAddr, conn_id: u64, tx: InboundTx)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, %err, "WebSocket handshake failed");
            return;
        }
    };
    let (write, mut read) = ws_stream.split();

    let (out_tx, out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let writer = spawn_writer(write, out_rx);
    let cancel_token = CancellationToken::new();

    // Notify the server loop that a connection is established.
    tx.send(InboundEvent::Connected {
        conn_id,
        peer,
        outbound: out_tx.clone(),
        cancel_token: cancel_token.clone(),
    })
    .await
    .ok();

    let mut disconnect_reason = "eof".to_string();

    loop {
        let msg = tokio::select! {
            msg = read.next() => msg,
            _ = cancel_token.cancelled() => {
                disconnect_reason = "terminated by server".to_string();
                break;
            }
        };

        let msg = match msg {
            None => break,
            Some(Err(err)) => {
                disconnect_reason = format!("read error: {err}");
                break;
            }
            Some(Ok(msg)) => msg,
        };

        let forwarded = match msg {
            Message::Text(text) => {
                tx.send(InboundEvent::Frame {
                    conn_id,
                    peer,
                    text: text.as_str().to_string(),
                })
                .await
            }
            // Tolerate clients that ship JSON in binary frames.
            Message::Binary(data) => {
                tx.send(InboundEvent::Frame {
                    conn_id,
                    peer,
                    text: String::from_utf8_lossy(&data).into_owned(),
                })
                .await
            }
            Message::Pong(_) => tx.send(InboundEvent::Pong { conn_id }).await,
            Message::Ping(data) => {
                // Reply inline; the shared write queue keeps ordering.
                let _ = out_tx.try_send(Message::Pong(data));
                Ok(())
            }
            Message::Close(_) => {
                disconnect_reason = "closed by client".to_string();
                break;
            }
            Message::Frame(_) => Ok(()),
        };

        if forwarded.is_err() {
            // Server loop is gone -> stop connection task.
            disconnect_reason = "inbound channel closed".to_string();
            break;
        }
    }

    // Notify disconnect (best-effort).
    let _ = tx
        .send(InboundEvent::Disconnected {
            conn_id,
            peer,
            reason: disconnect_reason,
        })
        .await;

    // Close outbound channel so the writer can exit.
    drop(out_tx);
    let _ = writer.await;
}
