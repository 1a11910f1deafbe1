//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::identifier::Identifier;
use super::log::RequestLog;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 3;
/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Admission limits for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum admitted requests inside one window
    pub max_requests: u32,
    /// Length of the sliding window in milliseconds
    pub window_ms: u64,
}

impl Limits {
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Outcome of a single admission check.
///
/// Every field is taken under the same lock as the decision, so it reflects
/// exactly this check and no concurrent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request may proceed
    pub admitted: bool,
    /// Live entries right after the decision
    pub count: usize,
    /// On rejection, how long until a slot frees up; `None` if admitted or
    /// if no slot ever will
    pub retry_after: Option<Duration>,
}

/// Wait until `live` has room for one more entry under `limits`.
fn wait_for_slot(mut live: Vec<u64>, now: u64, limits: Limits) -> Option<Duration> {
    let max = limits.max_requests as usize;
    if max == 0 {
        return None;
    }
    if live.len() < max {
        return Some(Duration::ZERO);
    }

    // One more admission needs the oldest `len - max + 1` entries gone.
    live.sort_unstable();
    let blocking = live[live.len() - max];
    let expires_at = blocking.saturating_add(limits.window_ms);
    Some(Duration::from_millis(expires_at.saturating_sub(now)))
}

/// Sliding-window rate limiter keyed by caller identifier.
///
/// One instance is built at startup and shared behind an `Arc` by every
/// handler. The read-filter-write of an admission runs while holding the
/// map's shard lock for that identifier, so concurrent callers can never
/// push an identifier past its limit.
pub struct RateLimiter {
    /// Request logs indexed by identifier
    logs: DashMap<Identifier, RequestLog>,
    /// Limits used when the caller does not pass its own
    defaults: Limits,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(defaults: Limits) -> Self {
        Self::with_clock(defaults, Arc::new(SystemClock))
    }

    /// Create a rate limiter reading time from `clock`.
    pub fn with_clock(defaults: Limits, clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: DashMap::new(),
            defaults,
            clock,
        }
    }

    /// The default limits.
    pub fn limits(&self) -> Limits {
        self.defaults
    }

    /// Check and record a request for `identifier` under the default limits.
    ///
    /// Returns `true` if the request is admitted, `false` if over limit.
    pub fn admit(&self, identifier: &str) -> bool {
        self.admit_with(identifier, self.defaults)
    }

    /// Check and record a request for `identifier` under `limits`.
    pub fn admit_with(&self, identifier: &str, limits: Limits) -> bool {
        self.check(identifier, limits).admitted
    }

    /// Check and record a request, reporting the state the decision saw.
    ///
    /// A rejected request leaves the stored log untouched, so it never
    /// consumes a slot. An admitted request replaces the log with its live
    /// window plus the new entry.
    pub fn check(&self, identifier: &str, limits: Limits) -> Admission {
        let now = self.clock.now_millis();

        trace!(
            identifier = %identifier,
            max_requests = limits.max_requests,
            window_ms = limits.window_ms,
            "Checking rate limit"
        );

        let max = limits.max_requests as usize;
        let admission = match self.logs.entry(Identifier::from(identifier)) {
            Entry::Occupied(mut entry) => {
                let live = entry.get().live(now, limits.window_ms);
                if live.len() >= max {
                    Admission {
                        admitted: false,
                        count: live.len(),
                        retry_after: wait_for_slot(live, now, limits),
                    }
                } else {
                    let count = live.len() + 1;
                    entry.get_mut().record(live, now, limits.window_ms);
                    Admission {
                        admitted: true,
                        count,
                        retry_after: None,
                    }
                }
            }
            Entry::Vacant(entry) => {
                if max == 0 {
                    Admission {
                        admitted: false,
                        count: 0,
                        retry_after: None,
                    }
                } else {
                    entry.insert(RequestLog::starting_at(now, limits.window_ms));
                    Admission {
                        admitted: true,
                        count: 1,
                        retry_after: None,
                    }
                }
            }
        };

        if !admission.admitted {
            debug!(
                identifier = %identifier,
                max_requests = limits.max_requests,
                window_ms = limits.window_ms,
                "Rate limit exceeded"
            );
        }

        admission
    }

    /// Live entries for `identifier` under the default window.
    pub fn count(&self, identifier: &str) -> usize {
        self.count_with(identifier, self.defaults.window_ms)
    }

    /// Live entries for `identifier` under `window_ms`. Does not prune.
    pub fn count_with(&self, identifier: &str, window_ms: u64) -> usize {
        let now = self.clock.now_millis();
        self.logs
            .get(identifier)
            .map(|log| log.live_count(now, window_ms))
            .unwrap_or(0)
    }

    /// How long until `identifier` could be admitted under `limits`.
    ///
    /// `Some(Duration::ZERO)` means a request would be admitted now. `None`
    /// means no request can ever be admitted (`max_requests == 0`).
    pub fn retry_after(&self, identifier: &str, limits: Limits) -> Option<Duration> {
        let now = self.clock.now_millis();
        let live = self
            .logs
            .get(identifier)
            .map(|log| log.live(now, limits.window_ms))
            .unwrap_or_default();
        wait_for_slot(live, now, limits)
    }

    /// Drop identifiers with no live entries.
    ///
    /// Each log is judged against the widest window it was admitted under,
    /// so a sweep never changes a decision made with the windows that
    /// identifier has used. Returns the number of identifiers removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();

        let mut removed = 0;
        self.logs.retain(|_, log| {
            let idle = log.is_idle(now);
            if idle {
                removed += 1;
            }
            !idle
        });

        removed
    }

    /// Forget every identifier.
    ///
    /// Test isolation only: in production this would forgive every caller
    /// at once.
    pub fn reset(&self) {
        self.logs.clear();
    }

    /// Get the number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        self.logs.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
