//! Budget manager: four concurrent windows (per-request, minute, hour, day)
//! plus per-request and per-day cost ceilings, all behind one mutex.
//!
//! Counters are integers — cost is stored as cost × 10⁶ — and every read
//! and write of a window goes through the same `parking_lot::Mutex`.
//! Mixing atomics for the counters with a mutex for the window-rollover
//! logic was tried and produced racy reads where a rollover could clear a
//! window between a caller's atomic increment and its window check; one
//! lock for the whole state avoids that class of bug entirely.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, warn};

const COST_SCALE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub per_request_tokens: u64,
    pub per_minute_tokens: u64,
    pub per_hour_tokens: u64,
    pub per_day_tokens: u64,
    pub per_request_cost: f64,
    pub per_day_cost: f64,
    pub alert_threshold: f64,
    pub auto_throttle: bool,
    pub throttle_delay: Duration,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            per_request_tokens: u64::MAX,
            per_minute_tokens: u64::MAX,
            per_hour_tokens: u64::MAX,
            per_day_tokens: u64::MAX,
            per_request_cost: f64::MAX,
            per_day_cost: f64::MAX,
            alert_threshold: 0.8,
            auto_throttle: true,
            throttle_delay: Duration::from_secs(60),
        }
    }
}

struct Window {
    size: ChronoDuration,
    start: DateTime<Utc>,
    tokens: u64,
    alerted: bool,
}

impl Window {
    fn new(size: ChronoDuration, now: DateTime<Utc>) -> Self {
        Self {
            size,
            start: now,
            tokens: 0,
            alerted: false,
        }
    }

    /// Day windows anchor to midnight rather than "24h since first call".
    fn new_day_anchored(now: DateTime<Utc>) -> Self {
        let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        Self {
            size: ChronoDuration::hours(24),
            start: midnight,
            tokens: 0,
            alerted: false,
        }
    }

    fn maybe_roll_over(&mut self, now: DateTime<Utc>) {
        if now - self.start >= self.size {
            self.tokens = 0;
            self.start = now;
            self.alerted = false;
        }
    }
}

struct State {
    minute: Window,
    hour: Window,
    day: Window,
    cost_micros_day: i64,
    throttle_until: Option<DateTime<Utc>>,
}

/// The decision `CheckBudget` hands back, in priority order: an active
/// throttle wins over a per-request violation, which wins over a window
/// violation.
#[derive(Debug, PartialEq)]
pub enum BudgetDecision {
    Allowed,
    Throttled { retry_after: Duration },
    PerRequestExceeded,
    WindowExceeded { window: &'static str },
}

pub struct BudgetManager {
    limits: BudgetLimits,
    state: parking_lot::Mutex<State>,
}

impl BudgetManager {
    pub fn new(limits: BudgetLimits) -> Self {
        let now = Utc::now();
        Self {
            limits,
            state: parking_lot::Mutex::new(State {
                minute: Window::new(ChronoDuration::minutes(1), now),
                hour: Window::new(ChronoDuration::hours(1), now),
                day: Window::new_day_anchored(now),
                cost_micros_day: 0,
                throttle_until: None,
            }),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Checks whether a request of the given estimated size may proceed,
    /// without yet recording it. A window violation on the minute window
    /// arms the throttle when `auto_throttle` is enabled.
    pub fn check_budget(&self, estimated_tokens: u64, estimated_cost: f64) -> BudgetDecision {
        let now = Self::now();
        let mut state = self.state.lock();

        if let Some(until) = state.throttle_until {
            if now < until {
                let retry_after = (until - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(0));
                return BudgetDecision::Throttled { retry_after };
            }
            state.throttle_until = None;
        }

        if estimated_tokens > self.limits.per_request_tokens
            || estimated_cost > self.limits.per_request_cost
        {
            return BudgetDecision::PerRequestExceeded;
        }

        state.minute.maybe_roll_over(now);
        state.hour.maybe_roll_over(now);
        state.day.maybe_roll_over(now);

        if state.minute.tokens + estimated_tokens > self.limits.per_minute_tokens {
            if self.limits.auto_throttle {
                state.throttle_until = Some(now + ChronoDuration::from_std(self.limits.throttle_delay).unwrap());
                warn!(delay = ?self.limits.throttle_delay, "minute token window exceeded, throttle armed");
            }
            return BudgetDecision::WindowExceeded { window: "minute" };
        }
        if state.hour.tokens + estimated_tokens > self.limits.per_hour_tokens {
            return BudgetDecision::WindowExceeded { window: "hour" };
        }
        if state.day.tokens + estimated_tokens > self.limits.per_day_tokens {
            return BudgetDecision::WindowExceeded { window: "day" };
        }
        let cost_micros = (estimated_cost * COST_SCALE as f64) as i64;
        if state.cost_micros_day + cost_micros > (self.limits.per_day_cost * COST_SCALE as f64) as i64 {
            return BudgetDecision::WindowExceeded { window: "day_cost" };
        }

        BudgetDecision::Allowed
    }

    /// Records actual usage against all windows and returns which windows
    /// just crossed the alert threshold for the first time this window.
    pub fn record_usage(&self, tokens: u64, cost: f64) -> Vec<&'static str> {
        let now = Self::now();
        let mut state = self.state.lock();

        state.minute.maybe_roll_over(now);
        state.hour.maybe_roll_over(now);
        state.day.maybe_roll_over(now);

        state.minute.tokens += tokens;
        state.hour.tokens += tokens;
        state.day.tokens += tokens;
        state.cost_micros_day += (cost * COST_SCALE as f64) as i64;

        let mut newly_alerted = Vec::new();
        let threshold = self.limits.alert_threshold;
        if !state.minute.alerted
            && state.minute.tokens as f64 >= self.limits.per_minute_tokens as f64 * threshold
        {
            state.minute.alerted = true;
            newly_alerted.push("minute");
        }
        if !state.hour.alerted
            && state.hour.tokens as f64 >= self.limits.per_hour_tokens as f64 * threshold
        {
            state.hour.alerted = true;
            newly_alerted.push("hour");
        }
        if !state.day.alerted
            && state.day.tokens as f64 >= self.limits.per_day_tokens as f64 * threshold
        {
            state.day.alerted = true;
            newly_alerted.push("day");
        }
        if !newly_alerted.is_empty() {
            debug!(windows = ?newly_alerted, "budget alert threshold crossed");
        }
        newly_alerted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_within_every_limit() {
        let mgr = BudgetManager::new(BudgetLimits::default());
        assert_eq!(mgr.check_budget(100, 0.01), BudgetDecision::Allowed);
    }

    #[test]
    fn per_request_ceiling_rejects_oversized_estimate() {
        let limits = BudgetLimits {
            per_request_tokens: 100,
            ..BudgetLimits::default()
        };
        let mgr = BudgetManager::new(limits);
        assert_eq!(
            mgr.check_budget(200, 0.01),
            BudgetDecision::PerRequestExceeded
        );
    }

    #[test]
    fn exceeding_minute_window_arms_throttle_and_then_throttles() {
        let limits = BudgetLimits {
            per_minute_tokens: 100,
            auto_throttle: true,
            throttle_delay: Duration::from_secs(5),
            ..BudgetLimits::default()
        };
        let mgr = BudgetManager::new(limits);
        mgr.record_usage(100, 0.0);
        let decision = mgr.check_budget(50, 0.0);
        assert_eq!(decision, BudgetDecision::WindowExceeded { window: "minute" });

        let decision2 = mgr.check_budget(1, 0.0);
        assert!(matches!(decision2, BudgetDecision::Throttled { .. }));
    }

    #[test]
    fn record_usage_alerts_once_per_window() {
        let limits = BudgetLimits {
            per_minute_tokens: 100,
            alert_threshold: 0.5,
            ..BudgetLimits::default()
        };
        let mgr = BudgetManager::new(limits);
        let first = mgr.record_usage(60, 0.0);
        assert_eq!(first, vec!["minute"]);
        let second = mgr.record_usage(1, 0.0);
        assert!(second.is_empty());
    }
}
