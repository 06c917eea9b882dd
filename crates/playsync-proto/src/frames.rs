//! JSON frames exchanged over the relay connection.
//!
//! Frames are internally tagged on `"type"`; field names follow the wire
//! contract (camelCase). `serverTime` is stamped by the relay on forward,
//! never by the originator.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::snapshot::{ParticipantIdentity, PlaybackSnapshot};

/// Player action carried by an event frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Play,
    Pause,
    Seek,
    Ratechange,
    Heartbeat,
}

/// Body shared by `event` and `heartbeat` frames sent by a client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub action: SyncAction,
    #[serde(default)]
    pub state: PlaybackSnapshot,
    /// Originator's clock at send time (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<u64>,
}

/// Client -> relay frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        room: String,
        #[serde(default)]
        client_id: String,
        #[serde(default)]
        nickname: String,
    },
    Event(EventBody),
    Heartbeat(EventBody),
    Ping,
}

/// An event after the relay stamped and re-addressed it for fan-out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedEvent {
    pub action: SyncAction,
    #[serde(default)]
    pub state: PlaybackSnapshot,
    pub room: String,
    pub client_id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<u64>,
    /// Relay's local clock at forward time; the common time base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// Codes reported to a peer that violated the protocol.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingRoom,
    NotJoined,
    BadJson,
    UnknownType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Relay -> client frames.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Ack {
        room: String,
        client_id: String,
        nickname: String,
        clients: Vec<ParticipantIdentity>,
        server_time: u64,
    },
    #[serde(rename_all = "camelCase")]
    Presence {
        action: PresenceAction,
        client_id: String,
        nickname: String,
        clients: Vec<ParticipantIdentity>,
        server_time: u64,
    },
    Event(RelayedEvent),
    Heartbeat(RelayedEvent),
    Error { error: ErrorBody },
    #[serde(rename_all = "camelCase")]
    Pong { server_time: u64 },
}

/// Encode any frame as a JSON text payload.
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<String, ProtoError> {
    serde_json::to_string(frame).map_err(ProtoError::Encode)
}

const KNOWN_CLIENT_TYPES: [&str; 4] = ["join", "event", "heartbeat", "ping"];

/// Decode an inbound client frame, classifying failures.
///
/// Undecodable JSON and a known frame type with malformed fields both reject
/// as `bad_json`; well-formed JSON with an unrecognized `type` rejects as
/// `unknown_type`.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, ProtoError> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => Ok(frame),
        Err(err) => {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
                return Err(ProtoError::BadJson(err));
            };
            match value.get("type").and_then(|t| t.as_str()) {
                Some(ty) if !KNOWN_CLIENT_TYPES.contains(&ty) => {
                    Err(ProtoError::UnknownType(ty.to_string()))
                }
                _ => Err(ProtoError::BadJson(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_frame_decodes_from_wire_json() {
        let frame = decode_client_frame(
            r#"{"type":"join","room":"movie-night","clientId":"client-abc123","nickname":"ada"}"#,
        )
        .expect("decode");
        assert_eq!(
            frame,
            ClientFrame::Join {
                room: "movie-night".into(),
                client_id: "client-abc123".into(),
                nickname: "ada".into(),
            }
        );
    }

    #[test]
    fn heartbeat_frame_round_trips() {
        let frame = ClientFrame::Heartbeat(EventBody {
            action: SyncAction::Heartbeat,
            state: PlaybackSnapshot {
                current_time: 42.0,
                paused: false,
                ..Default::default()
            },
            sent_at: Some(1_700_000_000_000),
        });
        let text = encode_frame(&frame).expect("encode");
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["action"], "heartbeat");
        assert_eq!(json["sentAt"], 1_700_000_000_000_u64);
        assert_eq!(decode_client_frame(&text).expect("decode"), frame);
    }

    #[test]
    fn relayed_event_carries_sender_identity_and_server_time() {
        let frame = ServerFrame::Event(RelayedEvent {
            action: SyncAction::Seek,
            state: PlaybackSnapshot::default(),
            room: "r1".into(),
            client_id: "client-a".into(),
            nickname: "ada".into(),
            sent_at: Some(5),
            server_time: Some(9),
        });
        let json: serde_json::Value =
            serde_json::from_str(&encode_frame(&frame).expect("encode")).expect("json");
        assert_eq!(json["type"], "event");
        assert_eq!(json["clientId"], "client-a");
        assert_eq!(json["serverTime"], 9);
    }

    #[test]
    fn non_json_payload_rejects_as_bad_json() {
        let err = decode_client_frame("not json at all").expect_err("reject");
        assert_eq!(err.error_code(), ErrorCode::BadJson);
    }

    #[test]
    fn unrecognized_type_rejects_as_unknown_type() {
        let err = decode_client_frame(r#"{"type":"subscribe","room":"r1"}"#).expect_err("reject");
        assert_eq!(err.error_code(), ErrorCode::UnknownType);
    }

    #[test]
    fn known_type_with_malformed_fields_rejects_as_bad_json() {
        let err =
            decode_client_frame(r#"{"type":"event","action":"explode"}"#).expect_err("reject");
        assert_eq!(err.error_code(), ErrorCode::BadJson);
    }

    #[test]
    fn ping_is_a_bare_tagged_frame() {
        assert_eq!(
            decode_client_frame(r#"{"type":"ping"}"#).expect("decode"),
            ClientFrame::Ping
        );
    }
}
