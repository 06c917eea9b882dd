//! Agent configuration.
//!
//! Supplied by the embedder at connect time; the agent does not persist
//! anything itself.

use std::time::Duration;

use crate::policy::CorrectionPolicy;

/// Configuration for one sync agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Relay URL; a bare host:port gets a `ws://` scheme.
    pub server: String,
    pub room: String,
    pub nickname: String,
    /// Stable per-installation id; see [`generated_client_id`] when the
    /// embedder has none persisted yet.
    pub client_id: String,
    pub policy: CorrectionPolicy,
    /// Heartbeat timer period while playing.
    pub heartbeat_period: Duration,
    /// Settle window per suppression entry.
    pub settle: Duration,
    /// Minimum gap between two outbound seek events (collapses scrubbing).
    pub seek_min_gap: Duration,
}

impl AgentConfig {
    pub fn new(
        server: impl Into<String>,
        room: impl Into<String>,
        nickname: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            room: room.into(),
            nickname: nickname.into(),
            client_id: client_id.into(),
            policy: CorrectionPolicy::default(),
            heartbeat_period: Duration::from_millis(4000),
            settle: Duration::from_millis(900),
            seek_min_gap: Duration::from_millis(100),
        }
    }
}

/// Generate a fresh client id for an installation without one.
pub fn generated_client_id() -> String {
    format!("client-{:016x}", rand::random::<u64>())
}
