//! Agent error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] playsync_proto::ProtoError),

    #[error("channel send error")]
    ChannelSend,
}
