//! Correction policy: dead-zones plus a global cooldown.
//!
//! A correction is a programmatic seek issued to chase a peer's position.
//! Corrections are deliberately hard to trigger: each action kind has a
//! dead-zone below which a discrepancy is ignored, and one accepted
//! correction starts a cooldown during which every further candidate is
//! dropped, whichever peer it came from.

use std::time::{Duration, Instant};

/// Action kind a candidate correction was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionKind {
    /// A peer's play/pause transition.
    PlayPause,
    /// A peer's deliberate seek.
    Seek,
    /// Drift observed through a periodic heartbeat.
    Heartbeat,
}

/// Tunables for the correction state machine.
#[derive(Debug, Clone)]
pub struct CorrectionPolicy {
    /// Dead-zone for play/pause transitions, seconds.
    pub play_pause_deadzone: f64,
    /// Dead-zone for deliberate seeks, seconds. Tightest: an explicit seek
    /// should be honored quickly.
    pub seek_deadzone: f64,
    /// Dead-zone for heartbeat drift, seconds. Widest: heartbeats are
    /// frequent and noisy, so small continuous drift is never fought.
    pub heartbeat_deadzone: f64,
    /// Minimum time between two accepted corrections, across all kinds.
    pub cooldown: Duration,
    /// When false, heartbeats only chase forward: a local player that is
    /// ahead of the remote is never seeked backward, which stops two peers
    /// slightly ahead of each other from dueling indefinitely. When true
    /// (default), heartbeats correct in both directions and the wide
    /// dead-zone plus the cooldown carry the anti-oscillation load.
    pub rewind_on_heartbeat: bool,
    /// Cap on `sentAt`-based latency compensation.
    pub max_latency: Duration,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            play_pause_deadzone: 0.70,
            seek_deadzone: 0.40,
            heartbeat_deadzone: 0.90,
            cooldown: Duration::from_millis(1500),
            rewind_on_heartbeat: true,
            max_latency: Duration::from_millis(300),
        }
    }
}

impl CorrectionPolicy {
    pub fn deadzone(&self, kind: CorrectionKind) -> f64 {
        match kind {
            CorrectionKind::PlayPause => self.play_pause_deadzone,
            CorrectionKind::Seek => self.seek_deadzone,
            CorrectionKind::Heartbeat => self.heartbeat_deadzone,
        }
    }
}

/// Decides whether a time discrepancy warrants a corrective seek.
#[derive(Debug)]
pub struct CorrectionGate {
    policy: CorrectionPolicy,
    last_correction_at: Option<Instant>,
}

impl CorrectionGate {
    pub fn new(policy: CorrectionPolicy) -> Self {
        Self {
            policy,
            last_correction_at: None,
        }
    }

    pub fn policy(&self) -> &CorrectionPolicy {
        &self.policy
    }

    /// Evaluate a candidate correction.
    ///
    /// `gap` is signed: `target - local`, positive when the remote is
    /// ahead. Accepting the correction arms the cooldown; a rejection is a
    /// silent no-op.
    pub fn should_correct(&mut self, kind: CorrectionKind, gap: f64, now: Instant) -> bool {
        if let Some(last) = self.last_correction_at
            && now.duration_since(last) < self.policy.cooldown
        {
            return false;
        }
        if kind == CorrectionKind::Heartbeat && !self.policy.rewind_on_heartbeat && gap <= 0.0 {
            return false;
        }
        if !gap.is_finite() || gap.abs() <= self.policy.deadzone(kind) {
            return false;
        }
        self.last_correction_at = Some(now);
        true
    }

    /// Forget the cooldown so a fresh session starts clean.
    pub fn reset(&mut self) {
        self.last_correction_at = None;
    }
}
