//! Latency compensation for remote-reported playback positions.

use std::time::Duration;

/// Estimated one-way delay for a relayed event, in milliseconds.
///
/// The relay-stamped `server_time` is preferred: it reflects only the
/// relay->receiver hop, independent of clock skew between originator and
/// receiver. The originator-stamped `sent_at` runs on an arbitrary remote
/// clock, so that path is clamped to `max_latency` and compensates for
/// jitter only, never clock skew.
pub fn estimate_latency_ms(
    now_ms: u64,
    sent_at: Option<u64>,
    server_time: Option<u64>,
    max_latency: Duration,
) -> u64 {
    if let Some(server_time) = server_time {
        return now_ms.saturating_sub(server_time);
    }
    if let Some(sent_at) = sent_at {
        return now_ms
            .saturating_sub(sent_at)
            .min(max_latency.as_millis() as u64);
    }
    0
}

/// Estimated "true" current playback position for a remote snapshot.
///
/// Floored at zero; non-finite inputs yield zero.
pub fn estimate_target(
    current_time: f64,
    sent_at: Option<u64>,
    server_time: Option<u64>,
    now_ms: u64,
    max_latency: Duration,
) -> f64 {
    let latency = estimate_latency_ms(now_ms, sent_at, server_time, max_latency);
    let target = current_time + latency as f64 / 1000.0;
    if target.is_finite() { target.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Duration = Duration::from_millis(300);

    #[test]
    fn server_time_path_is_unclamped() {
        assert_eq!(estimate_latency_ms(10_000, None, Some(2_000), MAX), 8_000);
    }

    #[test]
    fn server_time_wins_over_sent_at() {
        assert_eq!(
            estimate_latency_ms(10_000, Some(9_990), Some(9_900), MAX),
            100
        );
    }

    #[test]
    fn sent_at_path_clamps_to_max_latency() {
        // now - sentAt = 10000ms, clamp is exactly 300ms.
        assert_eq!(estimate_latency_ms(20_000, Some(10_000), None, MAX), 300);
    }

    #[test]
    fn skewed_originator_clock_never_goes_negative() {
        // sentAt in the receiver's future.
        assert_eq!(estimate_latency_ms(1_000, Some(5_000), None, MAX), 0);
        assert_eq!(estimate_latency_ms(1_000, None, Some(5_000), MAX), 0);
    }

    #[test]
    fn no_timestamps_means_no_compensation() {
        assert_eq!(estimate_latency_ms(1_000, None, None, MAX), 0);
    }

    #[test]
    fn target_adds_latency_in_seconds() {
        let target = estimate_target(10.0, None, Some(900), 1_000, MAX);
        assert!((target - 10.1).abs() < 1e-9);
    }

    #[test]
    fn non_finite_position_yields_zero() {
        assert_eq!(estimate_target(f64::NAN, None, None, 0, MAX), 0.0);
        assert_eq!(estimate_target(f64::INFINITY, None, None, 0, MAX), 0.0);
    }

    #[test]
    fn target_is_floored_at_zero() {
        assert_eq!(estimate_target(-5.0, None, None, 0, MAX), 0.0);
    }
}
