//! Rate limiter configuration and policy types.

use std::time::Duration;

/// Default interval between cleanup sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// One counting window: how many attempts fit before denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

/// Limit policy for one endpoint category.
///
/// `short` is the ordinary counting window. `long`, when present, is a second
/// stricter ceiling: exceeding it while still inside the long window hard
/// blocks the client until the long window boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPolicy {
    pub short: WindowPolicy,
    pub long: Option<WindowPolicy>,
}

impl LimitPolicy {
    /// Login limits: 5 attempts per 5 minutes, hard block at 10 per hour.
    pub fn login() -> Self {
        Self {
            short: WindowPolicy {
                max_attempts: 5,
                window: Duration::from_secs(5 * 60),
            },
            long: Some(WindowPolicy {
                max_attempts: 10,
                window: Duration::from_secs(60 * 60),
            }),
        }
    }

    /// Admin mutation limits: 10 requests per 15 minutes, no long ceiling.
    pub fn admin() -> Self {
        Self {
            short: WindowPolicy {
                max_attempts: 10,
                window: Duration::from_secs(15 * 60),
            },
            long: None,
        }
    }
}

/// Bounds for the in-memory fallback store.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Hard cap on tracked (identifier, endpoint) pairs. Inserting past the
    /// cap evicts an expired entry, or the oldest one.
    pub max_entries: usize,
    /// Entries inspected per sweep invocation.
    pub sweep_scan_limit: usize,
    /// Entries deleted per sweep invocation.
    pub sweep_delete_limit: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            sweep_scan_limit: 500,
            sweep_delete_limit: 200,
        }
    }
}

/// Top-level configuration for a `RateLimiter`.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub login: LimitPolicy,
    pub admin: LimitPolicy,
    pub fallback: FallbackConfig,
    pub sweep_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            login: LimitPolicy::login(),
            admin: LimitPolicy::admin(),
            fallback: FallbackConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
