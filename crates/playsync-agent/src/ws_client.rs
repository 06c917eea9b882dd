//! Async WebSocket client for the sync relay.
//!
//! This module provides a tokio-based WebSocket client that handles:
//! - Connection to the relay
//! - Frame encoding/decoding
//! - Async send/receive loops

use futures_util::{SinkExt, StreamExt};
use playsync_proto::{ServerFrame, encode_frame};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::AgentError;

/// Events sent from the WebSocket client to the agent loop.
#[derive(Debug)]
pub enum WsClientEvent {
    /// A decoded relay frame.
    Frame(ServerFrame),
    /// Transport closed.
    Disconnected { reason: String },
}

/// Commands sent to the WebSocket client from the agent loop.
#[derive(Debug)]
enum WsClientCommand {
    /// Send an already encoded frame.
    Send(String),
    /// Close and shut down.
    Close,
}

/// Handle for sending frames on a running connection.
#[derive(Debug, Clone)]
pub struct WsClientHandle {
    cmd_tx: mpsc::Sender<WsClientCommand>,
}

impl WsClientHandle {
    /// Encode and send one frame to the relay.
    pub async fn send_frame<T: Serialize>(&self, frame: &T) -> Result<(), AgentError> {
        let text = encode_frame(frame)?;
        self.cmd_tx
            .send(WsClientCommand::Send(text))
            .await
            .map_err(|_| AgentError::ChannelSend)
    }

    /// Request a graceful close.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(WsClientCommand::Close).await;
    }
}

/// Prefix a bare `host:port` with `ws://`; explicit schemes pass through.
pub fn normalize_server_url(server: &str) -> String {
    let trimmed = server.trim();
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    }
}

/// Connect to the relay and spawn the read/write tasks.
///
/// Returns a handle for sending frames; transport events arrive on
/// `event_tx`.
pub async fn connect(
    server: &str,
    event_tx: mpsc::Sender<WsClientEvent>,
) -> Result<WsClientHandle, AgentError> {
    let url = normalize_server_url(server);
    info!(%url, "connecting to sync relay");

    let (stream, _response) = connect_async(&url)
        .await
        .map_err(|e| AgentError::ConnectionFailed(format!("connect to {url} failed: {e}")))?;

    let (write, read) = stream.split();
    let (cmd_tx, cmd_rx) = mpsc::channel::<WsClientCommand>(64);

    tokio::spawn(writer_loop(write, cmd_rx));
    tokio::spawn(reader_loop(read, event_tx));

    Ok(WsClientHandle { cmd_tx })
}

type WsSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Writer task: receives commands and writes frames to the socket.
async fn writer_loop(mut write: WsSink, mut cmd_rx: mpsc::Receiver<WsClientCommand>) {
    loop {
        match cmd_rx.recv().await {
            Some(WsClientCommand::Send(text)) => {
                if let Err(e) = write.send(Message::text(text)).await {
                    warn!("write error: {e}");
                    break;
                }
            }
            Some(WsClientCommand::Close) => {
                debug!("close command received");
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            None => {
                debug!("command channel closed");
                break;
            }
        }
    }
    let _ = write.close().await;
}

/// Reader task: decodes relay frames and forwards them as events.
///
/// Undecodable frames are logged and skipped so one malformed broadcast
/// cannot take the session down.
async fn reader_loop(mut read: WsSource, event_tx: mpsc::Sender<WsClientEvent>) {
    let reason = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(frame) => {
                        if event_tx.send(WsClientEvent::Frame(frame)).await.is_err() {
                            debug!("event channel closed");
                            return;
                        }
                    }
                    Err(e) => warn!("skipping undecodable relay frame: {e}"),
                }
            }
            Some(Ok(Message::Close(_))) => break "relay closed connection".to_string(),
            // Control frames; ping replies are handled by the transport.
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "connection closed".to_string(),
        }
    };
    let _ = event_tx.send(WsClientEvent::Disconnected { reason }).await;
}
