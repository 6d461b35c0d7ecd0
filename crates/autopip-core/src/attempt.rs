//! PiP attempt state machine.
//!
//! `Idle/Blocked → AttemptPending → {InPip | Blocked | Idle}`, gated by a
//! fixed minimum interval between attempts. Also tracks the two signals
//! that stand in for gesture attribution: the arm window and the time of
//! the last raw interaction.
//!
//! Pure, deterministic state machine. All time values are epoch
//! milliseconds passed in by the caller.

use crate::error::PipError;
use crate::protocol::Notification;
use crate::recovery::BannerKind;
use crate::types::{PipReason, PipState};

// ─── Constants ────────────────────────────────────────────────────

/// No two attempts closer together than this.
pub const MIN_ATTEMPT_INTERVAL_MS: u64 = 1_500;
/// An interaction within this window counts as a recent gesture.
pub const RECENT_INTERACTION_MS: u64 = 5_000;
/// Past this, a tab-switch attempt waits briefly before calling the platform.
pub const STALE_INTERACTION_MS: u64 = 10_000;
/// Length of that wait.
pub const GESTURE_RACE_WAIT_MS: u64 = 100;

// ─── Outcomes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSkip {
    Throttled { since_last_ms: u64 },
    NoCandidate,
    AlreadyInPip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureAssessment {
    pub armed: bool,
    pub recent_interaction: bool,
    /// `None` when no interaction was ever observed.
    pub since_interaction_ms: Option<u64>,
    /// Delay before the platform call; zero for none.
    pub wait_ms: u64,
}

impl GestureAssessment {
    pub fn implicit_pass(&self) -> bool {
        self.armed || self.recent_interaction
    }
}

/// Side effects the caller performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    HideToast,
    HideBanner,
    ShowBanner(BannerKind),
    Notify(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    GestureRejected,
    Other,
}

// ─── Session ──────────────────────────────────────────────────────

/// Page-local attempt state, created with the engine and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: PipState,
    /// State to fall back to if a pending attempt is abandoned.
    resting: PipState,
    armed_until_ms: u64,
    last_attempt_ms: Option<u64>,
    tab_switch_fail_count: u32,
    last_interaction_ms: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PipState {
        self.state
    }

    pub fn is_in_pip(&self) -> bool {
        self.state == PipState::InPip
    }

    pub fn tab_switch_fail_count(&self) -> u32 {
        self.tab_switch_fail_count
    }

    pub fn armed_until_ms(&self) -> u64 {
        self.armed_until_ms
    }

    pub fn is_armed(&self, now_ms: u64) -> bool {
        now_ms < self.armed_until_ms
    }

    /// Arm for `duration_ms` from `now_ms`. Re-arming replaces the window.
    pub fn arm(&mut self, now_ms: u64, duration_ms: u64) {
        self.armed_until_ms = now_ms.saturating_add(duration_ms);
        self.tab_switch_fail_count = 0;
    }

    pub fn record_interaction(&mut self, now_ms: u64) {
        self.last_interaction_ms = Some(now_ms);
    }

    /// Pass the throttle and mark an attempt in flight.
    ///
    /// The throttle slot is consumed even if the attempt is later abandoned.
    pub fn begin(&mut self, now_ms: u64) -> Result<(), AttemptSkip> {
        if let Some(last) = self.last_attempt_ms {
            let since_last_ms = now_ms.saturating_sub(last);
            if now_ms >= last && since_last_ms < MIN_ATTEMPT_INTERVAL_MS {
                return Err(AttemptSkip::Throttled { since_last_ms });
            }
        }
        self.begin_unthrottled(now_ms);
        Ok(())
    }

    /// Mark an attempt in flight without consulting the throttle. Still
    /// takes the slot, so automatic retriggers right after it are skipped.
    pub fn begin_unthrottled(&mut self, now_ms: u64) {
        self.last_attempt_ms = Some(now_ms);
        if self.state != PipState::AttemptPending {
            self.resting = self.state;
        }
        self.state = PipState::AttemptPending;
    }

    /// Drop an in-flight attempt without calling the platform.
    pub fn abandon(&mut self, skip: AttemptSkip) {
        if self.state != PipState::AttemptPending {
            return;
        }
        self.state = match skip {
            AttemptSkip::AlreadyInPip => PipState::InPip,
            _ => self.resting,
        };
    }

    pub fn assess_gesture(&self, reason: PipReason, now_ms: u64) -> GestureAssessment {
        let armed = self.is_armed(now_ms) || reason.carries_gesture();
        let since_interaction_ms = self
            .last_interaction_ms
            .map(|t| now_ms.saturating_sub(t));
        let recent_interaction = since_interaction_ms.is_some_and(|s| s < RECENT_INTERACTION_MS);
        let stale = since_interaction_ms.is_none_or(|s| s > STALE_INTERACTION_MS);

        let wait_ms = if reason == PipReason::TabSwitch && !armed && !recent_interaction && stale {
            GESTURE_RACE_WAIT_MS
        } else {
            0
        };

        GestureAssessment {
            armed,
            recent_interaction,
            since_interaction_ms,
            wait_ms,
        }
    }

    pub fn entered(&mut self, reason: PipReason) -> Vec<Effect> {
        self.state = PipState::InPip;
        self.tab_switch_fail_count = 0;
        vec![
            Effect::HideToast,
            Effect::HideBanner,
            Effect::Notify(Notification::PipEntered { reason }),
        ]
    }

    /// Record a refused attempt. Returns the failure class and the banner to
    /// request, if any.
    pub fn failed(
        &mut self,
        reason: PipReason,
        error: &PipError,
        now_ms: u64,
    ) -> (FailureKind, Option<BannerKind>) {
        if !error.is_gesture_rejection() {
            self.state = PipState::Idle;
            return (FailureKind::Other, None);
        }

        self.state = PipState::Blocked;
        let banner = match reason {
            PipReason::TabSwitch => {
                self.tab_switch_fail_count = self.tab_switch_fail_count.saturating_add(1);
                (self.tab_switch_fail_count == 1 && !self.is_armed(now_ms))
                    .then_some(BannerKind::Tab)
            }
            // The arm click reports through its own toast.
            PipReason::Armed => None,
            PipReason::Collapse => Some(BannerKind::Panel),
            PipReason::Background | PipReason::MediaSession => Some(BannerKind::Tab),
        };
        (FailureKind::GestureRejected, banner)
    }

    pub fn exited(&mut self) -> Vec<Effect> {
        self.state = PipState::Idle;
        vec![Effect::Notify(Notification::PipExited)]
    }

    /// Platform reported a PiP window opened. Authoritative.
    pub fn platform_entered(&mut self) {
        self.state = PipState::InPip;
    }

    /// Platform reported the PiP window closed. Authoritative.
    pub fn platform_left(&mut self) {
        if matches!(self.state, PipState::InPip | PipState::AttemptPending) {
            self.state = PipState::Idle;
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_772_020_800_000;
    const TEN_MIN: u64 = 600_000;

    #[test]
    fn throttle_rejects_second_attempt_inside_interval() {
        let mut s = Session::new();
        assert_eq!(s.begin(T0), Ok(()));
        s.abandon(AttemptSkip::NoCandidate);
        assert_eq!(
            s.begin(T0 + 1_499),
            Err(AttemptSkip::Throttled { since_last_ms: 1_499 })
        );
        assert_eq!(s.begin(T0 + 1_500), Ok(()));
    }

    #[test]
    fn unthrottled_begin_takes_the_slot() {
        let mut s = Session::new();
        s.begin(T0).expect("attempt");
        s.failed(PipReason::TabSwitch, &PipError::NoUserGesture, T0);

        s.begin_unthrottled(T0 + 500);
        assert_eq!(s.state(), PipState::AttemptPending);
        s.abandon(AttemptSkip::NoCandidate);
        assert_eq!(s.state(), PipState::Blocked);
        assert_eq!(
            s.begin(T0 + 1_000),
            Err(AttemptSkip::Throttled { since_last_ms: 500 })
        );
    }

    #[test]
    fn abandon_returns_to_resting_state() {
        let mut s = Session::new();
        s.begin(T0).expect("first attempt");
        s.failed(PipReason::Collapse, &PipError::NoUserGesture, T0);
        assert_eq!(s.state(), PipState::Blocked);

        s.begin(T0 + 2_000).expect("second attempt");
        assert_eq!(s.state(), PipState::AttemptPending);
        s.abandon(AttemptSkip::NoCandidate);
        assert_eq!(s.state(), PipState::Blocked);

        s.begin(T0 + 4_000).expect("third attempt");
        s.abandon(AttemptSkip::AlreadyInPip);
        assert_eq!(s.state(), PipState::InPip);
    }

    #[test]
    fn arm_is_not_additive_and_resets_failures() {
        let mut s = Session::new();
        s.begin(T0).expect("attempt");
        s.failed(PipReason::TabSwitch, &PipError::NoUserGesture, T0);
        assert_eq!(s.tab_switch_fail_count(), 1);

        s.arm(T0 + 1_000, TEN_MIN);
        assert_eq!(s.armed_until_ms(), T0 + 1_000 + TEN_MIN);
        assert_eq!(s.tab_switch_fail_count(), 0);

        s.arm(T0 + 5_000, TEN_MIN);
        assert_eq!(s.armed_until_ms(), T0 + 5_000 + TEN_MIN);
        assert_eq!(s.tab_switch_fail_count(), 0);

        assert!(s.is_armed(T0 + 5_000 + TEN_MIN - 1));
        assert!(!s.is_armed(T0 + 5_000 + TEN_MIN));
    }

    #[test]
    fn tab_switch_banner_only_on_first_failure() {
        let mut s = Session::new();
        let mut banners = 0;
        for i in 0..3u64 {
            let now = T0 + i * 2_000;
            s.begin(now).expect("attempt");
            let (kind, banner) = s.failed(PipReason::TabSwitch, &PipError::NoUserGesture, now);
            assert_eq!(kind, FailureKind::GestureRejected);
            banners += usize::from(banner.is_some());
        }
        assert_eq!(banners, 1);
        assert_eq!(s.tab_switch_fail_count(), 3);
        assert_eq!(s.state(), PipState::Blocked);
    }

    #[test]
    fn tab_switch_failure_while_armed_shows_no_banner() {
        let mut s = Session::new();
        s.arm(T0, TEN_MIN);
        s.begin(T0 + 10).expect("attempt");
        let (_, banner) = s.failed(PipReason::TabSwitch, &PipError::NoUserGesture, T0 + 10);
        assert_eq!(banner, None);
    }

    #[test]
    fn collapse_failure_requests_banner_every_time() {
        let mut s = Session::new();
        for i in 0..2u64 {
            let now = T0 + i * 2_000;
            s.begin(now).expect("attempt");
            let (_, banner) = s.failed(PipReason::Collapse, &PipError::NoUserGesture, now);
            assert_eq!(banner, Some(BannerKind::Panel));
        }
        assert_eq!(s.tab_switch_fail_count(), 0);
    }

    #[test]
    fn other_failure_returns_to_idle_silently() {
        let mut s = Session::new();
        s.begin(T0).expect("attempt");
        let (kind, banner) = s.failed(PipReason::Collapse, &PipError::NotSupported, T0);
        assert_eq!(kind, FailureKind::Other);
        assert_eq!(banner, None);
        assert_eq!(s.state(), PipState::Idle);
    }

    #[test]
    fn success_resets_failures_and_clears_ui() {
        let mut s = Session::new();
        s.begin(T0).expect("attempt");
        s.failed(PipReason::TabSwitch, &PipError::NoUserGesture, T0);
        s.begin(T0 + 2_000).expect("attempt");
        let effects = s.entered(PipReason::Armed);

        assert!(s.is_in_pip());
        assert_eq!(s.tab_switch_fail_count(), 0);
        assert_eq!(
            effects,
            vec![
                Effect::HideToast,
                Effect::HideBanner,
                Effect::Notify(Notification::PipEntered {
                    reason: PipReason::Armed
                }),
            ]
        );
    }

    #[test]
    fn tab_switch_waits_only_when_interaction_is_stale() {
        let mut s = Session::new();
        // Never interacted.
        assert_eq!(s.assess_gesture(PipReason::TabSwitch, T0).wait_ms, GESTURE_RACE_WAIT_MS);
        // Collapse never waits.
        assert_eq!(s.assess_gesture(PipReason::Collapse, T0).wait_ms, 0);

        s.record_interaction(T0);
        let recent = s.assess_gesture(PipReason::TabSwitch, T0 + 4_000);
        assert!(recent.recent_interaction);
        assert!(recent.implicit_pass());
        assert_eq!(recent.wait_ms, 0);

        // Between 5s and 10s: not recent, not stale.
        let middle = s.assess_gesture(PipReason::TabSwitch, T0 + 8_000);
        assert!(!middle.implicit_pass());
        assert_eq!(middle.wait_ms, 0);

        let stale = s.assess_gesture(PipReason::TabSwitch, T0 + 10_001);
        assert_eq!(stale.since_interaction_ms, Some(10_001));
        assert_eq!(stale.wait_ms, GESTURE_RACE_WAIT_MS);

        s.arm(T0 + 20_000, TEN_MIN);
        let armed = s.assess_gesture(PipReason::TabSwitch, T0 + 30_000);
        assert!(armed.armed);
        assert_eq!(armed.wait_ms, 0);
    }

    #[test]
    fn platform_events_are_authoritative() {
        let mut s = Session::new();
        s.platform_entered();
        assert!(s.is_in_pip());
        s.platform_left();
        assert_eq!(s.state(), PipState::Idle);

        s.begin(T0).expect("attempt");
        s.failed(PipReason::Collapse, &PipError::NoUserGesture, T0);
        s.platform_left();
        assert_eq!(s.state(), PipState::Blocked);
    }

    #[test]
    fn exit_notifies() {
        let mut s = Session::new();
        s.platform_entered();
        assert_eq!(s.exited(), vec![Effect::Notify(Notification::PipExited)]);
        assert_eq!(s.state(), PipState::Idle);
    }
}
