//! Pending deadlines of one engine, keyed by purpose.
//!
//! Scheduling a timer again replaces its deadline, which is the only form
//! of cancellation a newer event of the same class needs.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timer {
    /// Delayed attempt after the page went hidden.
    TabSwitchAttempt,
    /// Viewport size cross-check.
    Poll,
    /// Follow-up check after start-up.
    InitialRecheck,
    /// Follow-up check after a video element appeared.
    VideoRecheck,
    /// Follow-up check after an in-page navigation.
    NavigationRecheck,
    BannerHide,
    ToastHide,
}

#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    deadlines: BTreeMap<Timer, u64>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, timer: Timer, at_ms: u64) {
        self.deadlines.insert(timer, at_ms);
    }

    pub fn cancel(&mut self, timer: Timer) -> bool {
        self.deadlines.remove(&timer).is_some()
    }

    pub fn deadline(&self, timer: Timer) -> Option<u64> {
        self.deadlines.get(&timer).copied()
    }

    pub fn is_pending(&self, timer: Timer) -> bool {
        self.deadlines.contains_key(&timer)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().copied().min()
    }

    /// Remove and return the earliest timer due at `now_ms`. Ties go to the
    /// timer declared first.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Timer> {
        let (timer, _) = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now_ms)
            .min_by_key(|(timer, at)| (**at, **timer))?;
        let timer = *timer;
        self.deadlines.remove(&timer);
        Some(timer)
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_replaces_deadline() {
        let mut timers = TimerSet::new();
        timers.schedule(Timer::BannerHide, 8_000);
        timers.schedule(Timer::BannerHide, 2_000);
        assert_eq!(timers.deadline(Timer::BannerHide), Some(2_000));
        assert_eq!(timers.next_deadline(), Some(2_000));
    }

    #[test]
    fn pops_due_timers_in_deadline_order() {
        let mut timers = TimerSet::new();
        timers.schedule(Timer::ToastHide, 300);
        timers.schedule(Timer::Poll, 500);
        timers.schedule(Timer::TabSwitchAttempt, 300);
        timers.schedule(Timer::BannerHide, 900);

        assert_eq!(timers.pop_due(600), Some(Timer::TabSwitchAttempt));
        assert_eq!(timers.pop_due(600), Some(Timer::ToastHide));
        assert_eq!(timers.pop_due(600), Some(Timer::Poll));
        assert_eq!(timers.pop_due(600), None);
        assert!(timers.is_pending(Timer::BannerHide));
    }

    #[test]
    fn cancel_reports_whether_pending() {
        let mut timers = TimerSet::new();
        assert!(!timers.cancel(Timer::Poll));
        timers.schedule(Timer::Poll, 10);
        assert!(timers.cancel(Timer::Poll));
        assert_eq!(timers.next_deadline(), None);
    }
}
