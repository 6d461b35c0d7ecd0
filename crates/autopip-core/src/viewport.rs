//! Collapse classification, edge detection, coalescing debounce and the
//! viewport poll schedule.
//!
//! Pure, testable state machines with no IO or async dependencies.

use crate::config::Config;
use crate::types::{Viewport, Visibility};

// ─── Constants ────────────────────────────────────────────────────

/// Poll cadence while the page is visible.
pub const POLL_VISIBLE_MS: u64 = 500;
/// Backed-off poll cadence while the page is hidden.
pub const POLL_HIDDEN_MS: u64 = 2_000;

// ─── Classification ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseThresholds {
    pub width_px: u32,
    pub height_px: u32,
}

impl From<&Config> for CollapseThresholds {
    fn from(cfg: &Config) -> Self {
        Self {
            width_px: cfg.collapse_width_px,
            height_px: cfg.collapse_height_px,
        }
    }
}

/// `(w > 0 && w <= W) || (h > 0 && h <= H)`.
///
/// A zero-sized axis never counts, so a fully hidden frame is not a collapse.
pub fn is_collapsed(viewport: Viewport, thresholds: CollapseThresholds) -> bool {
    let width_collapsed = viewport.width > 0 && viewport.width <= thresholds.width_px;
    let height_collapsed = viewport.height > 0 && viewport.height <= thresholds.height_px;
    width_collapsed || height_collapsed
}

// ─── Edge detection ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Collapsed,
    Expanded,
}

/// Reports changes of the collapse classification, never its level.
#[derive(Debug, Clone, Default)]
pub struct CollapseTracker {
    last_collapsed: bool,
}

impl CollapseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_collapsed(&self) -> bool {
        self.last_collapsed
    }

    pub fn observe(&mut self, collapsed: bool) -> Option<Transition> {
        match (self.last_collapsed, collapsed) {
            (false, true) => {
                self.last_collapsed = true;
                Some(Transition::Collapsed)
            }
            (true, false) => {
                self.last_collapsed = false;
                Some(Transition::Expanded)
            }
            _ => None,
        }
    }
}

// ─── Debounce ─────────────────────────────────────────────────────

/// Single pending timer. Scheduling again replaces both the deadline and
/// the value, so only the latest value survives the quiet period.
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    pending: Option<(u64, T)>,
}

impl<T> Default for Debounce<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> Debounce<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new deadline.
    pub fn schedule(&mut self, value: T, now_ms: u64, delay_ms: u64) -> u64 {
        let deadline = now_ms.saturating_add(delay_ms);
        self.pending = Some((deadline, value));
        deadline
    }

    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|(d, _)| *d)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the pending value if its deadline has passed.
    pub fn take_due(&mut self, now_ms: u64) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if deadline <= now_ms => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }
}

// ─── Poll ─────────────────────────────────────────────────────────

/// Cross-checks viewport size for resize mechanisms that fire no event.
#[derive(Debug, Clone, Default)]
pub struct ViewportPoller {
    last: Option<Viewport>,
}

impl ViewportPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval_ms(visibility: Visibility) -> u64 {
        match visibility {
            Visibility::Visible => POLL_VISIBLE_MS,
            Visibility::Hidden => POLL_HIDDEN_MS,
        }
    }

    /// Record a sample. Returns `true` when it differs from the previous
    /// one; the first sample only primes the poller.
    pub fn observe(&mut self, viewport: Viewport) -> bool {
        match self.last.replace(viewport) {
            None => false,
            Some(prev) => prev != viewport,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
