//! Fixed-window attempt accounting.
//!
//! `record_attempt` is the single transition function applied by every store
//! backend, so the database path and the in-memory fallback path produce the
//! same allow/deny sequence for the same inputs. Stores only differ in how
//! they load and persist the resulting `WindowState`.

use crate::config::LimitPolicy;

/// Per (identifier, endpoint) counter state.
///
/// Invariants: `count` never decreases within an active window, and
/// `reset_time_ms` never moves backward while a block is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    /// Attempts observed in the current window (including denied ones).
    pub count: u32,
    /// Epoch ms of the first attempt in the current window.
    pub first_attempt_ms: i64,
    /// Epoch ms when the window (or hard block) expires.
    pub reset_time_ms: i64,
    /// Set once the long-window ceiling has been exceeded.
    pub blocked: bool,
}

impl WindowState {
    /// Whether this record's window or block has elapsed.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_time_ms
    }
}

/// The allow/deny outcome handed back to route handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitDecision {
    pub allowed: bool,
    /// Attempts counted so far in the window, including this one.
    pub current_count: u32,
    /// Epoch ms when the window resets. `None` only for the fail-open path.
    pub reset_time_ms: Option<i64>,
    /// Seconds until retry is worthwhile. Only present on denials; callers
    /// translate this into an HTTP 429 `Retry-After` header.
    pub retry_after_secs: Option<u64>,
}

impl LimitDecision {
    fn allowed(count: u32, reset_time_ms: i64) -> Self {
        Self {
            allowed: true,
            current_count: count,
            reset_time_ms: Some(reset_time_ms),
            retry_after_secs: None,
        }
    }

    fn denied(count: u32, reset_time_ms: i64, now_ms: i64) -> Self {
        let remaining_ms = (reset_time_ms - now_ms).max(0);
        // Round up so a denial never advertises a zero-second retry.
        let retry_after = ((remaining_ms + 999) / 1000).max(1) as u64;
        Self {
            allowed: false,
            current_count: count,
            reset_time_ms: Some(reset_time_ms),
            retry_after_secs: Some(retry_after),
        }
    }

    /// Decision used when every store failed: allow rather than lock out.
    pub(crate) fn fail_open() -> Self {
        Self {
            allowed: true,
            current_count: 0,
            reset_time_ms: None,
            retry_after_secs: None,
        }
    }
}

/// Apply one attempt to the previous state and produce the next state plus
/// the decision for this attempt.
///
/// A missing or expired record starts a fresh window with `count = 1`.
/// Otherwise the count is incremented; denied attempts still count, which is
/// what lets the long-window ceiling engage: a client hammering past the
/// short ceiling keeps raising `count` until it crosses the long ceiling
/// while still inside the long window, at which point the record hard-blocks
/// until the long window boundary.
pub fn record_attempt(
    prev: Option<&WindowState>,
    policy: &LimitPolicy,
    now_ms: i64,
) -> (WindowState, LimitDecision) {
    match prev {
        Some(state) if !state.is_expired(now_ms) => {
            let count = state.count.saturating_add(1);
            let mut next = WindowState {
                count,
                first_attempt_ms: state.first_attempt_ms,
                reset_time_ms: state.reset_time_ms,
                blocked: state.blocked,
            };

            if !next.blocked && count <= policy.short.max_attempts {
                let decision = LimitDecision::allowed(count, next.reset_time_ms);
                return (next, decision);
            }

            if !next.blocked {
                if let Some(long) = &policy.long {
                    let long_end_ms =
                        state.first_attempt_ms + long.window.as_millis() as i64;
                    if count > long.max_attempts && now_ms < long_end_ms {
                        next.blocked = true;
                        // Extend to the long-window boundary, never backward.
                        next.reset_time_ms = next.reset_time_ms.max(long_end_ms);
                    }
                }
            }

            let decision = LimitDecision::denied(count, next.reset_time_ms, now_ms);
            (next, decision)
        }
        _ => {
            let reset_time_ms = now_ms + policy.short.window.as_millis() as i64;
            let next = WindowState {
                count: 1,
                first_attempt_ms: now_ms,
                reset_time_ms,
                blocked: false,
            };
            let decision = if policy.short.max_attempts >= 1 {
                LimitDecision::allowed(1, reset_time_ms)
            } else {
                LimitDecision::denied(1, reset_time_ms, now_ms)
            };
            (next, decision)
        }
    }
}
