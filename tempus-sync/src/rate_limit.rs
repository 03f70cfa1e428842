//! Fixed-window admission gate, one window per API credential.
//!
//! This is the engine's only shared mutable state. Windows reset lazily on
//! read; no background timer is required, though `sweep` can reclaim stale
//! credentials in long-lived processes.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Injected time source so tests can step a fake clock instead of
/// depending on wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::seconds(60),
        }
    }
}

/// Structured admission result. Denials are data, never errors; the caller
/// decides whether to surface `RateLimited { reset_at }`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Box<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Box::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Box<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one attempted call for `key` and report whether it is
    /// admitted within the current window.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limit lock poisoned");

        let window = windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.policy.window,
            });

        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.policy.window;
        }

        window.count += 1;

        let allowed = window.count <= self.policy.max_requests;
        if !allowed {
            tracing::warn!(
                "rate limit exceeded ({} > {}), window resets at {}",
                window.count,
                self.policy.max_requests,
                window.reset_at
            );
        }

        RateLimitDecision {
            allowed,
            remaining: self.policy.max_requests.saturating_sub(window.count),
            reset_at: window.reset_at,
        }
    }

    /// Drop windows whose reset time has passed.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limit lock poisoned");
        windows.retain(|_, w| now < w.reset_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Steps forward only when told to.
    struct ManualClock {
        epoch_secs: Arc<AtomicI64>,
    }

    impl ManualClock {
        fn new() -> (Self, Arc<AtomicI64>) {
            let secs = Arc::new(AtomicI64::new(1_700_000_000));
            (
                Self {
                    epoch_secs: Arc::clone(&secs),
                },
                secs,
            )
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.epoch_secs.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn limiter(max: u32) -> (RateLimiter, Arc<AtomicI64>) {
        let (clock, handle) = ManualClock::new();
        let policy = RateLimitPolicy {
            max_requests: max,
            window: Duration::seconds(60),
        };
        (RateLimiter::with_clock(policy, Box::new(clock)), handle)
    }

    #[test]
    fn allows_up_to_max_then_denies() {
        let (limiter, _) = limiter(3);
        for i in 0..3 {
            let d = limiter.check("key-a");
            assert!(d.allowed, "call {} should be allowed", i);
        }
        let denied = limiter.check("key-a");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn windows_are_per_credential() {
        let (limiter, _) = limiter(1);
        assert!(limiter.check("key-a").allowed);
        assert!(!limiter.check("key-a").allowed);
        assert!(limiter.check("key-b").allowed);
    }

    #[test]
    fn fresh_window_after_reset() {
        let (limiter, clock) = limiter(2);
        assert!(limiter.check("key-a").allowed);
        assert!(limiter.check("key-a").allowed);
        let denied = limiter.check("key-a");
        assert!(!denied.allowed);

        clock.fetch_add(61, Ordering::SeqCst);
        let fresh = limiter.check("key-a");
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
        assert!(fresh.reset_at > denied.reset_at);
    }

    #[test]
    fn sweep_reclaims_expired_windows() {
        let (limiter, clock) = limiter(5);
        limiter.check("key-a");
        clock.fetch_add(120, Ordering::SeqCst);
        limiter.sweep();
        assert!(limiter.windows.lock().unwrap().is_empty());
    }
}
