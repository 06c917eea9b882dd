use thiserror::Error;

use crate::frames::ErrorCode;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("invalid JSON payload: {0}")]
    BadJson(serde_json::Error),
    #[error("unsupported message type: {0}")]
    UnknownType(String),
    #[error("frame encode failed: {0}")]
    Encode(serde_json::Error),
}

impl ProtoError {
    /// Error code reported back to the offending peer.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtoError::BadJson(_) => ErrorCode::BadJson,
            ProtoError::UnknownType(_) => ErrorCode::UnknownType,
            ProtoError::Encode(_) => ErrorCode::BadJson,
        }
    }
}
