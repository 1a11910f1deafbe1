//! Per-identifier request log.

/// Timestamps (ms since epoch) of admitted requests, in insertion order.
///
/// Whether an entry counts is decided purely by its age: an entry is live
/// while `now - timestamp < window_ms`. Ages saturate at zero, so an entry
/// stamped after `now` (the clock stepped backwards) is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLog {
    timestamps: Vec<u64>,
    /// Widest window this log has been admitted under
    retention_ms: u64,
}

/// Whether a timestamp is inside the window ending at `now`.
#[inline]
fn is_live(timestamp: u64, now: u64, window_ms: u64) -> bool {
    now.saturating_sub(timestamp) < window_ms
}

impl RequestLog {
    /// Create a log holding a single admission under `window_ms`.
    pub fn starting_at(now: u64, window_ms: u64) -> Self {
        Self {
            timestamps: vec![now],
            retention_ms: window_ms,
        }
    }

    /// The number of entries inside the window.
    pub fn live_count(&self, now: u64, window_ms: u64) -> usize {
        self.timestamps
            .iter()
            .filter(|&&t| is_live(t, now, window_ms))
            .count()
    }

    /// The entries inside the window, in insertion order.
    pub fn live(&self, now: u64, window_ms: u64) -> Vec<u64> {
        self.timestamps
            .iter()
            .copied()
            .filter(|&t| is_live(t, now, window_ms))
            .collect()
    }

    /// Replace the log with its live window plus `now`.
    ///
    /// Callers must already have checked the live window has room.
    pub fn record(&mut self, live: Vec<u64>, now: u64, window_ms: u64) {
        self.timestamps = live;
        self.timestamps.push(now);
        self.retention_ms = self.retention_ms.max(window_ms);
    }

    /// Whether no entry is live under any window this log was admitted with.
    pub fn is_idle(&self, now: u64) -> bool {
        !self
            .timestamps
            .iter()
            .any(|&t| is_live(t, now, self.retention_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(timestamps: &[u64], retention_ms: u64) -> RequestLog {
        RequestLog {
            timestamps: timestamps.to_vec(),
            retention_ms,
        }
    }

    #[test]
    fn test_live_count_uses_strict_age() {
        let log = log_of(&[0, 10, 20], 60_000);

        assert_eq!(log.live_count(59_999, 60_000), 3);
        // Exactly window_ms old is expired.
        assert_eq!(log.live_count(60_000, 60_000), 2);
        assert_eq!(log.live_count(60_020, 60_000), 0);
    }

    #[test]
    fn test_zero_window_is_always_empty() {
        let log = RequestLog::starting_at(100, 0);
        assert_eq!(log.live_count(100, 0), 0);
        assert!(log.is_idle(100));
    }

    #[test]
    fn test_future_entries_are_live() {
        let log = RequestLog::starting_at(5_000, 60_000);
        assert_eq!(log.live_count(1_000, 60_000), 1);
        assert!(!log.is_idle(1_000));
    }

    #[test]
    fn test_record_drops_expired_entries() {
        let mut log = log_of(&[0, 10, 20], 60_000);

        let live = log.live(60_005, 60_000);
        assert_eq!(live, vec![10, 20]);

        log.record(live, 60_005, 60_000);
        assert_eq!(log.live(60_005, 60_000), vec![10, 20, 60_005]);
    }

    #[test]
    fn test_retention_follows_widest_admitted_window() {
        let mut log = RequestLog::starting_at(0, 1_000);
        assert!(log.is_idle(1_000));

        log.record(log.live(500, 1_000), 500, 10_000);
        assert!(!log.is_idle(9_000));
        assert!(log.is_idle(10_500));

        // A narrower window later never shrinks retention.
        log.record(log.live(600, 100), 600, 100);
        assert!(!log.is_idle(10_000));
    }
}
