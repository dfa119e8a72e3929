//! Per-user debounce windows and the daily job quota.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use crate::{roles::UserRecord, types::UserId};

/// Repeat commands inside this window are silently dropped.
pub const COMMAND_DEBOUNCE: Duration = Duration::from_secs(3);

/// Any inbound free-text inside this window is silently dropped. Deliberately
/// much stricter than the command debounce; it runs first in the unified
/// message path and supersedes it for non-command traffic.
pub const FLOOD_WINDOW: Duration = Duration::from_secs(20);

/// Relay jobs a non-owner may trigger per rolling day.
pub const DAILY_JOB_LIMIT: u32 = 100;

const DAY_SECS: u64 = 86_400;

/// Per-user last-activity clock backing both debounce windows.
///
/// One shared clock, two windows: commands check the short window, all other
/// inbound traffic the long one.
#[derive(Debug, Default)]
pub struct FloodGate {
    last_seen: HashMap<UserId, Instant>,
}

impl FloodGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate for command-pattern messages (3 s window). Updates the clock only
    /// when the command is allowed through.
    pub fn allow_command(&mut self, user: UserId, now: Instant) -> bool {
        if self.within(user, now, COMMAND_DEBOUNCE) {
            return false;
        }
        self.last_seen.insert(user, now);
        true
    }

    /// Blanket gate for ANY inbound message (20 s window). Always updates the
    /// clock, including on a drop, so sustained flooding keeps the window
    /// closed.
    pub fn allow_message(&mut self, user: UserId, now: Instant) -> bool {
        let allowed = !self.within(user, now, FLOOD_WINDOW);
        self.last_seen.insert(user, now);
        allowed
    }

    fn within(&self, user: UserId, now: Instant, window: Duration) -> bool {
        self.last_seen
            .get(&user)
            .is_some_and(|last| now.duration_since(*last) < window)
    }
}

/// Verdict of the daily quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaVerdict {
    Allowed,
    Exhausted,
}

/// Enforce the rolling daily quota on `record`.
///
/// The counter resets lazily when more than a day has passed since the last
/// reset; there is no background timer. Owners bypass the quota entirely.
pub fn check_quota(record: &mut UserRecord, is_owner: bool, now_epoch: u64) -> QuotaVerdict {
    if now_epoch.saturating_sub(record.last_reset) > DAY_SECS {
        record.last_reset = now_epoch;
        record.daily_count = 0;
    }

    if record.daily_count >= DAILY_JOB_LIMIT && !is_owner {
        QuotaVerdict::Exhausted
    } else {
        QuotaVerdict::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn first_message_is_allowed() {
        let mut gate = FloodGate::new();
        assert!(gate.allow_message(UserId(1), now()));
    }

    #[test]
    fn second_message_within_window_is_dropped() {
        let mut gate = FloodGate::new();
        let t0 = now();
        assert!(gate.allow_message(UserId(1), t0));
        assert!(!gate.allow_message(UserId(1), t0 + Duration::from_secs(5)));
    }

    #[test]
    fn message_after_window_is_allowed() {
        let mut gate = FloodGate::new();
        let t0 = now();
        assert!(gate.allow_message(UserId(1), t0));
        assert!(gate.allow_message(UserId(1), t0 + Duration::from_secs(21)));
    }

    #[test]
    fn dropped_message_still_refreshes_window() {
        let mut gate = FloodGate::new();
        let t0 = now();
        assert!(gate.allow_message(UserId(1), t0));
        // Dropped, but the clock moves to t0+15.
        assert!(!gate.allow_message(UserId(1), t0 + Duration::from_secs(15)));
        // 21s after t0 but only 6s after the dropped message: still closed.
        assert!(!gate.allow_message(UserId(1), t0 + Duration::from_secs(21)));
    }

    #[test]
    fn users_are_independent() {
        let mut gate = FloodGate::new();
        let t0 = now();
        assert!(gate.allow_message(UserId(1), t0));
        assert!(gate.allow_message(UserId(2), t0));
    }

    #[test]
    fn command_debounce_uses_short_window() {
        let mut gate = FloodGate::new();
        let t0 = now();
        assert!(gate.allow_command(UserId(1), t0));
        assert!(!gate.allow_command(UserId(1), t0 + Duration::from_secs(2)));
        assert!(gate.allow_command(UserId(1), t0 + Duration::from_secs(4)));
    }

    #[test]
    fn quota_rejects_non_owner_at_limit() {
        let mut record = UserRecord::new("Alice");
        record.daily_count = DAILY_JOB_LIMIT;
        let at = record.last_reset + 10;
        assert_eq!(
            check_quota(&mut record, false, at),
            QuotaVerdict::Exhausted
        );
    }

    #[test]
    fn quota_does_not_apply_to_owners() {
        let mut record = UserRecord::new("Olga");
        record.daily_count = DAILY_JOB_LIMIT;
        let at = record.last_reset + 10;
        assert_eq!(
            check_quota(&mut record, true, at),
            QuotaVerdict::Allowed
        );
    }

    #[test]
    fn quota_resets_lazily_after_a_day() {
        let mut record = UserRecord::new("Alice");
        record.daily_count = DAILY_JOB_LIMIT;
        let later = record.last_reset + DAY_SECS + 1;
        assert_eq!(check_quota(&mut record, false, later), QuotaVerdict::Allowed);
        assert_eq!(record.daily_count, 0);
        assert_eq!(record.last_reset, later);
    }

    #[test]
    fn quota_under_limit_is_allowed() {
        let mut record = UserRecord::new("Alice");
        record.daily_count = DAILY_JOB_LIMIT - 1;
        let at = record.last_reset + 10;
        assert_eq!(
            check_quota(&mut record, false, at),
            QuotaVerdict::Allowed
        );
    }
}
