use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
///
/// This is the common base for `sentAt` (stamped by the originator) and
/// `serverTime` (stamped by the relay on forward).
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
