//! Weekly message quota
//!
//! Periods end at Sunday 00:00:00 UTC. A timestamp exactly on the boundary
//! belongs to the period that starts there, so its reset date is one week out.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEEKLY_QUOTA: u32 = 7;

/// Usage above this share of the quota is flagged in the UI.
const NEAR_LIMIT_PERCENT: f64 = 80.0;

pub fn can_send(current_usage: u32, max_quota: u32) -> bool {
    current_usage < max_quota
}

/// The first Sunday 00:00 UTC strictly after `now`.
pub fn next_reset_date(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = 7 - now.weekday().num_days_from_sunday() as i64;
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight + Duration::days(days_ahead)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    current_usage: u32,
    max_quota: u32,
    reset_at: DateTime<Utc>,
}

impl QuotaState {
    /// A fresh period starting at `now`. A zero quota is raised to one.
    pub fn new(max_quota: u32, now: DateTime<Utc>) -> Self {
        Self {
            current_usage: 0,
            max_quota: max_quota.max(1),
            reset_at: next_reset_date(now),
        }
    }

    pub fn with_usage(mut self, current_usage: u32) -> Self {
        self.current_usage = current_usage;
        self
    }

    pub fn current_usage(&self) -> u32 {
        self.current_usage
    }

    pub fn max_quota(&self) -> u32 {
        self.max_quota
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }

    /// Roll into a new period if `now` has reached the reset date.
    /// Returns true when usage was reset.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        tracing::info!(
            previous_usage = self.current_usage,
            "weekly quota period rolled over"
        );
        self.current_usage = 0;
        self.reset_at = next_reset_date(now);
        true
    }

    pub fn can_send(&self) -> bool {
        can_send(self.current_usage, self.max_quota)
    }

    pub fn record_use(&mut self) {
        self.current_usage = self.current_usage.saturating_add(1);
    }

    pub fn remaining(&self) -> u32 {
        self.max_quota.saturating_sub(self.current_usage)
    }

    pub fn usage_percentage(&self) -> f64 {
        self.current_usage as f64 / self.max_quota as f64 * 100.0
    }

    pub fn is_near_limit(&self) -> bool {
        self.usage_percentage() > NEAR_LIMIT_PERCENT
    }

    pub fn is_limit_reached(&self) -> bool {
        !self.can_send()
    }

    /// Whole days until the reset date, rounded up.
    pub fn days_until_reset(&self, now: DateTime<Utc>) -> i64 {
        let remaining = self.reset_at - now;
        let ms = remaining.num_milliseconds();
        if ms <= 0 {
            return 0;
        }
        let day_ms = Duration::days(1).num_milliseconds();
        (ms + day_ms - 1) / day_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_can_send_is_strictly_less_than() {
        for max in 0..10 {
            for usage in 0..12 {
                assert_eq!(can_send(usage, max), usage < max);
            }
        }
    }

    #[test]
    fn test_next_reset_midweek() {
        // 2026-10-21 is a Wednesday.
        let now = at(2026, 10, 21, 15, 30);
        let reset = next_reset_date(now);
        assert_eq!(reset, at(2026, 10, 25, 0, 0));
        assert_eq!(reset.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_next_reset_on_saturday_night() {
        let now = at(2026, 10, 24, 23, 59);
        assert_eq!(next_reset_date(now), at(2026, 10, 25, 0, 0));
    }

    #[test]
    fn test_boundary_rolls_to_following_week() {
        let boundary = at(2026, 10, 25, 0, 0);
        assert_eq!(next_reset_date(boundary), at(2026, 11, 1, 0, 0));
        // Later on Sunday too.
        assert_eq!(next_reset_date(at(2026, 10, 25, 9, 0)), at(2026, 11, 1, 0, 0));
    }

    #[test]
    fn test_record_and_exhaust() {
        let now = at(2026, 10, 21, 12, 0);
        let mut quota = QuotaState::new(7, now).with_usage(6);
        assert!(quota.can_send());
        assert_eq!(quota.remaining(), 1);
        assert!(quota.is_near_limit());

        quota.record_use();
        assert_eq!(quota.current_usage(), 7);
        assert!(quota.is_limit_reached());
        assert_eq!(quota.remaining(), 0);
    }

    #[test]
    fn test_refresh_only_after_reset() {
        let now = at(2026, 10, 21, 12, 0);
        let mut quota = QuotaState::new(7, now).with_usage(7);

        assert!(!quota.refresh(at(2026, 10, 24, 23, 59)));
        assert_eq!(quota.current_usage(), 7);

        assert!(quota.refresh(at(2026, 10, 25, 0, 0)));
        assert_eq!(quota.current_usage(), 0);
        assert_eq!(quota.reset_at(), at(2026, 11, 1, 0, 0));
    }

    #[test]
    fn test_days_until_reset_rounds_up() {
        let quota = QuotaState::new(7, at(2026, 10, 21, 12, 0));
        assert_eq!(quota.days_until_reset(at(2026, 10, 21, 12, 0)), 4);
        assert_eq!(quota.days_until_reset(at(2026, 10, 24, 23, 0)), 1);
        assert_eq!(quota.days_until_reset(at(2026, 10, 26, 0, 0)), 0);
    }

    #[test]
    fn test_zero_quota_is_raised() {
        let quota = QuotaState::new(0, Utc::now());
        assert_eq!(quota.max_quota(), 1);
    }
}
