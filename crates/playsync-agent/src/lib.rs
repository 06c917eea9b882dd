//! Playback sync agent library.
//!
//! This crate keeps a locally attached media player in sync with peers in a
//! shared room through a relay, without fighting them: corrections pass
//! through per-action dead-zones and a global cooldown, and remote-driven
//! player changes are suppressed from re-broadcast.
//!
//! # Architecture
//!
//! - [`session`]: Sync state machine, outbound shaping and remote-event
//!   application
//! - [`policy`]: Correction dead-zones and cooldown
//! - [`suppress`]: Echo suppression for programmatic player changes
//! - [`latency`]: Latency-compensated target position estimation
//! - [`player`]: Injected player control surfaces
//! - [`ws_client`]: Async WebSocket client for the relay
//! - [`handler`]: Agent loop tying it all together
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod handler;
pub mod latency;
pub mod player;
pub mod policy;
pub mod session;
pub mod suppress;
pub mod ws_client;

// Re-export commonly used types
pub use config::{AgentConfig, generated_client_id};
pub use error::AgentError;
pub use handler::{AgentCommand, AgentNotice, SyncAgent};
pub use player::{MediaDescriptor, MediaSurface, PlayerControls, PlayerError, PlayerHandle};
pub use policy::{CorrectionGate, CorrectionKind, CorrectionPolicy};
pub use session::{PlayerEvent, SessionState, SyncSession};
pub use suppress::SuppressionGate;
pub use ws_client::{WsClientEvent, WsClientHandle, connect};
