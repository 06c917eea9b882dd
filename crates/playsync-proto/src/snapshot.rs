use serde::{Deserialize, Serialize};

/// One participant as seen in a room roster.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    /// Opaque id generated once per installation; unique within a room.
    pub client_id: String,
    pub nickname: String,
}

/// One instant of one peer's player.
///
/// Every field is defaulted so a sparse snapshot from a peer still decodes;
/// the relay forwards whatever it got.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSnapshot {
    pub media_id: String,
    pub locator_url: String,
    /// Playback position in seconds.
    pub current_time: f64,
    pub paused: bool,
    pub playback_rate: f64,
    /// Media duration in seconds (0 when unknown).
    pub duration: f64,
    pub title: String,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            media_id: String::new(),
            locator_url: String::new(),
            current_time: 0.0,
            paused: true,
            playback_rate: 1.0,
            duration: 0.0,
            title: String::new(),
        }
    }
}
