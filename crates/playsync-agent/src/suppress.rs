//! Suppression gate: mutes outbound events while the local player is being
//! driven programmatically.
//!
//! Applying a remote correction makes the local player fire its own
//! play/pause/seek notifications; re-broadcasting those would make peers
//! re-correct forever. Each programmatic block enters the gate and holds it
//! for a settle window; overlapping entries extend the mute rather than
//! truncating it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Reentrant mute counter with a per-entry settle delay.
///
/// Entries release in the order they were made (same settle window for
/// all), so the deadlines stay monotonic and the count saturates at zero.
#[derive(Debug)]
pub struct SuppressionGate {
    settle: Duration,
    releases: VecDeque<Instant>,
}

impl SuppressionGate {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            releases: VecDeque::new(),
        }
    }

    /// Enter the gate; the entry releases itself at `now + settle`.
    pub fn enter(&mut self, now: Instant) {
        self.releases.push_back(now + self.settle);
    }

    /// Number of entries still holding the gate at `now`.
    pub fn count(&mut self, now: Instant) -> usize {
        while let Some(deadline) = self.releases.front() {
            if *deadline <= now {
                self.releases.pop_front();
            } else {
                break;
            }
        }
        self.releases.len()
    }

    /// Whether locally observed player events must be muted at `now`.
    pub fn is_active(&mut self, now: Instant) -> bool {
        self.count(now) > 0
    }

    /// Drop all entries so a reconnect starts clean.
    pub fn clear(&mut self) {
        self.releases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(900);

    #[test]
    fn single_entry_releases_after_settle() {
        let mut gate = SuppressionGate::new(SETTLE);
        let t0 = Instant::now();
        gate.enter(t0);
        assert!(gate.is_active(t0));
        assert!(gate.is_active(t0 + SETTLE - Duration::from_millis(1)));
        assert!(!gate.is_active(t0 + SETTLE));
    }

    #[test]
    fn overlapping_entries_extend_the_mute_window() {
        let mut gate = SuppressionGate::new(SETTLE);
        let t0 = Instant::now();
        gate.enter(t0);
        gate.enter(t0 + Duration::from_millis(400));
        gate.enter(t0 + Duration::from_millis(800));

        // Still held right until the last entry's deadline...
        let last_release = t0 + Duration::from_millis(800) + SETTLE;
        assert_eq!(gate.count(t0 + Duration::from_millis(900)), 2);
        assert!(gate.is_active(last_release - Duration::from_millis(1)));
        // ...and zero exactly there, not before.
        assert_eq!(gate.count(last_release), 0);
    }

    #[test]
    fn count_saturates_at_zero() {
        let mut gate = SuppressionGate::new(SETTLE);
        let t0 = Instant::now();
        gate.enter(t0);
        let far = t0 + Duration::from_secs(60);
        assert_eq!(gate.count(far), 0);
        assert_eq!(gate.count(far), 0);
    }

    #[test]
    fn clear_releases_everything_immediately() {
        let mut gate = SuppressionGate::new(SETTLE);
        let t0 = Instant::now();
        gate.enter(t0);
        gate.enter(t0);
        gate.clear();
        assert!(!gate.is_active(t0));
    }
}
