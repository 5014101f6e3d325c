//! Rolling rate-limit windows
//!
//! Each window keeps the timestamps of consumed units and forgets the ones
//! older than its length. The limiter guards all windows with one lock, so
//! checking every applicable window and consuming from each is a single
//! indivisible step.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use scout_core::{ActionType, RateLimitConfig};

/// Which quota a window enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "scope", content = "action", rename_all = "snake_case")]
pub enum WindowScope {
    /// Rolling hour across all action types
    Hourly,
    /// Rolling day for one action type
    Daily(ActionType),
}

impl fmt::Display for WindowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowScope::Hourly => f.write_str("all actions per hour"),
            WindowScope::Daily(action) => write!(f, "{} per day", action),
        }
    }
}

/// A rolling counter with a quota
#[derive(Debug, Clone)]
pub struct RateLimitWindow {
    quota: u32,
    length: Duration,
    consumed: VecDeque<DateTime<Utc>>,
}

impl RateLimitWindow {
    pub fn new(quota: u32, length: Duration) -> Self {
        Self {
            quota,
            length,
            consumed: VecDeque::new(),
        }
    }

    pub fn hourly(quota: u32) -> Self {
        Self::new(quota, Duration::hours(1))
    }

    pub fn daily(quota: u32) -> Self {
        Self::new(quota, Duration::days(1))
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    pub fn set_quota(&mut self, quota: u32) {
        self.quota = quota;
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.length;
        while self.consumed.front().is_some_and(|t| *t <= cutoff) {
            self.consumed.pop_front();
        }
    }

    /// Units consumed within the window ending at `now`
    pub fn used(&mut self, now: DateTime<Utc>) -> u32 {
        self.prune(now);
        self.consumed.len() as u32
    }

    pub fn remaining(&mut self, now: DateTime<Utc>) -> u32 {
        self.quota.saturating_sub(self.used(now))
    }

    /// Timestamps stay sorted even when callers arrive out of order, so
    /// pruning from the front never leaves an expired unit behind.
    fn record(&mut self, now: DateTime<Utc>) {
        let at = self.consumed.partition_point(|t| *t <= now);
        self.consumed.insert(at, now);
    }

    /// Consume one unit if the quota allows it
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        if self.remaining(now) == 0 {
            return false;
        }
        self.record(now);
        true
    }
}

/// Usage snapshot of one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    pub scope: WindowScope,
    pub used: u32,
    pub quota: u32,
}

/// All quota windows behind one lock
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<BTreeMap<WindowScope, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let windows = BTreeMap::from([
            (
                WindowScope::Hourly,
                RateLimitWindow::hourly(config.max_actions_per_hour),
            ),
            (
                WindowScope::Daily(ActionType::Dm),
                RateLimitWindow::daily(config.max_dms_per_day),
            ),
            (
                WindowScope::Daily(ActionType::Comment),
                RateLimitWindow::daily(config.max_comments_per_day),
            ),
            (
                WindowScope::Daily(ActionType::Export),
                RateLimitWindow::daily(config.max_exports_per_day),
            ),
        ]);
        Self {
            windows: Mutex::new(windows),
        }
    }

    fn scopes_for(action: ActionType) -> [WindowScope; 2] {
        [WindowScope::Hourly, WindowScope::Daily(action)]
    }

    /// Check every window that applies to `action` and, only if all have
    /// room, consume one unit from each.
    ///
    /// Returns the first exhausted window on refusal; nothing is consumed then.
    pub fn try_consume(&self, action: ActionType, now: DateTime<Utc>) -> Result<(), WindowScope> {
        let mut windows = self.windows.lock();
        let scopes = Self::scopes_for(action);

        for scope in scopes {
            if let Some(window) = windows.get_mut(&scope) {
                if window.remaining(now) == 0 {
                    return Err(scope);
                }
            }
        }
        for scope in scopes {
            if let Some(window) = windows.get_mut(&scope) {
                window.record(now);
            }
        }
        Ok(())
    }

    /// Change quotas; consumption history is kept
    pub fn set_limits(&self, config: &RateLimitConfig) {
        let mut windows = self.windows.lock();
        let quotas = [
            (WindowScope::Hourly, config.max_actions_per_hour),
            (WindowScope::Daily(ActionType::Dm), config.max_dms_per_day),
            (WindowScope::Daily(ActionType::Comment), config.max_comments_per_day),
            (WindowScope::Daily(ActionType::Export), config.max_exports_per_day),
        ];
        for (scope, quota) in quotas {
            if let Some(window) = windows.get_mut(&scope) {
                window.set_quota(quota);
            }
        }
    }

    /// Usage of every window at `now`
    pub fn usage(&self, now: DateTime<Utc>) -> Vec<WindowUsage> {
        let mut windows = self.windows.lock();
        windows
            .iter_mut()
            .map(|(scope, window)| WindowUsage {
                scope: *scope,
                used: window.used(now),
                quota: window.quota(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(hourly: u32, dms: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_actions_per_hour: hourly,
            max_dms_per_day: dms,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_window_rolls_over() {
        let mut window = RateLimitWindow::hourly(2);
        let t0 = Utc::now();

        assert!(window.try_consume(t0));
        assert!(window.try_consume(t0 + Duration::minutes(10)));
        assert!(!window.try_consume(t0 + Duration::minutes(20)));

        // first unit expires exactly one hour after it was taken
        assert!(window.try_consume(t0 + Duration::minutes(60)));
        assert_eq!(window.used(t0 + Duration::minutes(60)), 2);
        assert_eq!(window.used(t0 + Duration::minutes(200)), 0);
    }

    #[test]
    fn test_out_of_order_consumption_expires_on_time() {
        let mut window = RateLimitWindow::hourly(5);
        let t0 = Utc::now();

        assert!(window.try_consume(t0 + Duration::minutes(30)));
        assert!(window.try_consume(t0));

        // the earlier unit lapses first even though it was recorded last
        assert_eq!(window.used(t0 + Duration::minutes(61)), 1);
        assert_eq!(window.used(t0 + Duration::minutes(91)), 0);
    }

    #[test]
    fn test_zero_quota_never_admits() {
        let mut window = RateLimitWindow::daily(0);
        assert!(!window.try_consume(Utc::now()));
    }

    #[test]
    fn test_refusal_consumes_nothing() {
        let limiter = RateLimiter::new(&limits(10, 1));
        let now = Utc::now();

        assert!(limiter.try_consume(ActionType::Dm, now).is_ok());
        assert_eq!(
            limiter.try_consume(ActionType::Dm, now),
            Err(WindowScope::Daily(ActionType::Dm))
        );

        let hourly = limiter
            .usage(now)
            .into_iter()
            .find(|u| u.scope == WindowScope::Hourly)
            .unwrap();
        assert_eq!(hourly.used, 1);
    }

    #[test]
    fn test_hourly_window_shared_across_types() {
        let limiter = RateLimiter::new(&limits(2, 10));
        let now = Utc::now();

        assert!(limiter.try_consume(ActionType::Dm, now).is_ok());
        assert!(limiter.try_consume(ActionType::Comment, now).is_ok());
        assert_eq!(
            limiter.try_consume(ActionType::Export, now),
            Err(WindowScope::Hourly)
        );
    }

    #[test]
    fn test_set_limits_keeps_history() {
        let limiter = RateLimiter::new(&limits(5, 5));
        let now = Utc::now();
        for _ in 0..3 {
            limiter.try_consume(ActionType::Comment, now).unwrap();
        }

        limiter.set_limits(&limits(3, 5));
        assert_eq!(
            limiter.try_consume(ActionType::Comment, now),
            Err(WindowScope::Hourly)
        );

        limiter.set_limits(&limits(4, 5));
        assert!(limiter.try_consume(ActionType::Comment, now).is_ok());
    }
}
