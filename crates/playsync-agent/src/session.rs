//! Sync session: connection state machine, outbound event shaping, and
//! application of remote events through the correction policy and the
//! suppression gate.
//!
//! Everything here is time-explicit (callers pass `Instant`/epoch-ms), so
//! the whole state machine is testable without a runtime. The agent loop in
//! [`crate::handler`] drives it from timers and transport events.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use playsync_proto::{ParticipantIdentity, PlaybackSnapshot, RelayedEvent, SyncAction};
use tracing::debug;

use crate::config::AgentConfig;
use crate::latency::estimate_target;
use crate::player::PlayerHandle;
use crate::policy::{CorrectionGate, CorrectionKind};
use crate::suppress::SuppressionGate;

/// Connection state of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not connected to any relay.
    #[default]
    Disconnected,
    /// Transport opening.
    Connecting,
    /// Join request sent, waiting for the roster ack.
    AwaitingAck,
    /// In a room, exchanging events.
    Synced,
}

/// A locally observed player notification, as delivered by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Play,
    Pause,
    Seeked,
    RateChange,
    /// Periodic progress notification; feeds the heartbeat path only.
    TimeUpdate,
}

/// Per-agent sync state. One instance per connection lifecycle; never
/// persisted.
#[derive(Debug)]
pub struct SyncSession {
    pub state: SessionState,
    pub roster: Vec<ParticipantIdentity>,
    /// Remote events that arrived while no player was attached, replayed in
    /// arrival order on attach.
    pending: VecDeque<RelayedEvent>,
    gate: CorrectionGate,
    suppression: SuppressionGate,
    /// Whether the heartbeat timer should be running. The agent loop
    /// reconciles its interval with this flag after every mutation.
    pub heartbeat_enabled: bool,
    heartbeat_period: Duration,
    seek_min_gap: Duration,
    last_seek_sent_at: Option<Instant>,
    last_heartbeat_sent_at: Option<Instant>,
    local_media_id: String,
}

impl SyncSession {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            roster: Vec::new(),
            pending: VecDeque::new(),
            gate: CorrectionGate::new(config.policy.clone()),
            suppression: SuppressionGate::new(config.settle),
            heartbeat_enabled: false,
            heartbeat_period: config.heartbeat_period,
            seek_min_gap: config.seek_min_gap,
            last_seek_sent_at: None,
            last_heartbeat_sent_at: None,
            local_media_id: String::new(),
        }
    }

    pub fn on_connect_started(&mut self) {
        self.state = SessionState::Connecting;
    }

    pub fn on_transport_open(&mut self) {
        self.state = SessionState::AwaitingAck;
    }

    pub fn on_ack(&mut self, roster: Vec<ParticipantIdentity>) {
        self.state = SessionState::Synced;
        self.roster = roster;
    }

    pub fn on_roster(&mut self, roster: Vec<ParticipantIdentity>) {
        self.roster = roster;
    }

    /// Transport closed or disconnect requested: back to `Disconnected`
    /// with heartbeat stopped and suppression/cooldown cleared, so a later
    /// reconnect starts clean.
    pub fn on_transport_closed(&mut self) {
        self.state = SessionState::Disconnected;
        self.roster.clear();
        self.pending.clear();
        self.heartbeat_enabled = false;
        self.suppression.clear();
        self.gate.reset();
        self.last_seek_sent_at = None;
        self.last_heartbeat_sent_at = None;
    }

    /// Record which media the attached player is showing.
    pub fn on_player_attached(&mut self, media_id: &str) {
        self.local_media_id = media_id.to_string();
    }

    pub fn on_player_detached(&mut self) {
        self.local_media_id.clear();
    }

    /// Outbound rate limiting. Returns whether an event of this kind may be
    /// sent now, and stamps the send time when it may.
    ///
    /// Seeks collapse scrubbing into one settled event; heartbeats keep a
    /// half-period distance so a manual nudge plus the timer do not
    /// double-send.
    pub fn shape_outbound(&mut self, action: SyncAction, now: Instant) -> bool {
        match action {
            SyncAction::Seek => {
                if let Some(last) = self.last_seek_sent_at
                    && now.duration_since(last) < self.seek_min_gap
                {
                    return false;
                }
                self.last_seek_sent_at = Some(now);
                true
            }
            SyncAction::Heartbeat => {
                if let Some(last) = self.last_heartbeat_sent_at
                    && now.duration_since(last) < self.heartbeat_period / 2
                {
                    return false;
                }
                self.last_heartbeat_sent_at = Some(now);
                true
            }
            _ => true,
        }
    }

    /// Map a locally observed player event to an outbound action.
    ///
    /// While suppressed (the local player is being driven programmatically)
    /// nothing is re-broadcast, but play/pause still flip the heartbeat
    /// flag so the agent's own cadence stays correct.
    pub fn local_player_event(
        &mut self,
        event: PlayerEvent,
        player_paused: bool,
        now: Instant,
    ) -> Option<SyncAction> {
        if self.state != SessionState::Synced {
            return None;
        }
        if self.suppression.is_active(now) {
            match event {
                PlayerEvent::Play => self.heartbeat_enabled = true,
                PlayerEvent::Pause => self.heartbeat_enabled = false,
                _ => {}
            }
            return None;
        }

        let action = match event {
            PlayerEvent::Play => {
                self.heartbeat_enabled = true;
                SyncAction::Play
            }
            PlayerEvent::Pause => {
                self.heartbeat_enabled = false;
                SyncAction::Pause
            }
            PlayerEvent::Seeked => SyncAction::Seek,
            PlayerEvent::RateChange => SyncAction::Ratechange,
            PlayerEvent::TimeUpdate => {
                if player_paused {
                    return None;
                }
                SyncAction::Heartbeat
            }
        };
        self.shape_outbound(action, now).then_some(action)
    }

    /// Queue a remote event until a player attaches.
    pub fn queue_remote(&mut self, event: RelayedEvent) {
        self.pending.push_back(event);
    }

    /// Drain events queued while no player was attached, in arrival order.
    pub fn take_pending(&mut self) -> Vec<RelayedEvent> {
        self.pending.drain(..).collect()
    }

    /// Apply one remote event to the attached player.
    ///
    /// The whole application runs under one suppression entry so the
    /// player's reactive notifications are not re-broadcast.
    pub fn apply_remote(
        &mut self,
        event: &RelayedEvent,
        player: &mut PlayerHandle,
        now: Instant,
        now_ms: u64,
    ) {
        // Events for other media are not ours to apply; an absent remote id
        // matches anything.
        if !event.state.media_id.is_empty() && event.state.media_id != self.local_media_id {
            debug!(
                remote = %event.state.media_id,
                local = %self.local_media_id,
                "ignoring event for different media"
            );
            return;
        }

        let target = estimate_target(
            event.state.current_time,
            event.sent_at,
            event.server_time,
            now_ms,
            self.gate.policy().max_latency,
        );
        let gap = target - player.current_time();

        self.suppression.enter(now);

        if event.state.playback_rate > 0.0
            && (player.playback_rate() - event.state.playback_rate).abs() > 0.001
        {
            player.set_rate(event.state.playback_rate);
        }

        match event.action {
            SyncAction::Play => {
                if self.gate.should_correct(CorrectionKind::PlayPause, gap, now) {
                    player.seek(target);
                }
                player.play();
                self.heartbeat_enabled = true;
            }
            SyncAction::Pause => {
                if self.gate.should_correct(CorrectionKind::PlayPause, gap, now) {
                    // Pause pins to the reported position; latency
                    // compensation would overshoot a stopped player.
                    player.seek(event.state.current_time.max(0.0));
                }
                player.pause();
                self.heartbeat_enabled = false;
            }
            SyncAction::Seek => {
                if self.gate.should_correct(CorrectionKind::Seek, gap, now) {
                    player.seek(target);
                }
            }
            SyncAction::Ratechange => {
                // Rate already reconciled above.
            }
            SyncAction::Heartbeat => {
                if !event.state.paused {
                    if self.gate.should_correct(CorrectionKind::Heartbeat, gap, now) {
                        player.seek(target);
                    }
                    player.play();
                    self.heartbeat_enabled = true;
                } else if !player.paused() {
                    player.pause();
                }
            }
        }
    }

    /// Build the outbound snapshot for the attached player.
    pub fn collect_snapshot(&self, player: &PlayerHandle) -> PlaybackSnapshot {
        let desc = player.descriptor();
        PlaybackSnapshot {
            media_id: desc.media_id.clone(),
            locator_url: desc.locator_url.clone(),
            current_time: player.current_time().max(0.0),
            paused: player.paused(),
            playback_rate: player.playback_rate(),
            duration: player.duration().max(0.0),
            title: desc.title.clone(),
        }
    }
}
