//! Recovery UI latch: which banner/toast is up, and when a new one may be
//! shown. Rendering and timers live with the caller.

use serde::{Deserialize, Serialize};

/// Banner auto-hide after it is shown.
pub const BANNER_AUTO_HIDE_MS: u64 = 8_000;
/// Banner hide delay after the first interaction while it is shown.
pub const BANNER_INTERACTION_HIDE_MS: u64 = 2_000;
/// Toast hide delay after an arm click that could not enter PiP.
pub const TOAST_LINGER_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    /// Blocked after a tab switch.
    Tab,
    /// Blocked after a panel collapse.
    Panel,
}

impl BannerKind {
    pub fn title(self) -> &'static str {
        "Picture-in-Picture Blocked"
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Tab => {
                "Better Auto PiP needs page interaction to work when switching tabs. \
                 Click anywhere on this page, then try again."
            }
            Self::Panel => {
                "Better Auto PiP needs page interaction to work when panel collapses. \
                 Click anywhere on this page, then try again."
            }
        }
    }
}

pub fn armed_toast_trying(minutes: u64) -> String {
    format!("Armed for {minutes} min. Trying PiP now...")
}

pub fn armed_toast_retry_later(minutes: u64) -> String {
    format!("Armed for {minutes} min. Collapse again to trigger PiP.")
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryUi {
    banner: Option<BannerKind>,
    /// Set while the banner waits for its first interaction.
    awaiting_interaction: bool,
    toast: Option<String>,
}

impl RecoveryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn banner(&self) -> Option<BannerKind> {
        self.banner
    }

    pub fn toast(&self) -> Option<&str> {
        self.toast.as_deref()
    }

    /// Returns `true` when the caller should render `kind` now.
    ///
    /// Only one banner is shown at a time, and none when alerts are off.
    pub fn request_banner(&mut self, kind: BannerKind, alerts_enabled: bool) -> bool {
        if !alerts_enabled || self.banner.is_some() {
            return false;
        }
        self.banner = Some(kind);
        self.awaiting_interaction = true;
        true
    }

    /// Returns `true` if a banner was up.
    pub fn hide_banner(&mut self) -> bool {
        self.awaiting_interaction = false;
        self.banner.take().is_some()
    }

    /// Returns `true` on the first interaction since the banner appeared,
    /// at which point the caller replaces the auto-hide with a short one.
    pub fn note_interaction(&mut self) -> bool {
        if self.banner.is_some() && self.awaiting_interaction {
            self.awaiting_interaction = false;
            return true;
        }
        false
    }

    /// Returns `false` if a toast is already up (its text is then replaced).
    pub fn show_toast(&mut self, text: String) -> bool {
        let fresh = self.toast.is_none();
        self.toast = Some(text);
        fresh
    }

    pub fn hide_toast(&mut self) -> bool {
        self.toast.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_banner_at_a_time() {
        let mut ui = RecoveryUi::new();
        assert!(ui.request_banner(BannerKind::Tab, true));
        assert!(!ui.request_banner(BannerKind::Panel, true));
        assert_eq!(ui.banner(), Some(BannerKind::Tab));

        assert!(ui.hide_banner());
        assert!(!ui.hide_banner());
        assert!(ui.request_banner(BannerKind::Panel, true));
    }

    #[test]
    fn alerts_flag_suppresses_banner() {
        let mut ui = RecoveryUi::new();
        assert!(!ui.request_banner(BannerKind::Panel, false));
        assert_eq!(ui.banner(), None);
    }

    #[test]
    fn only_first_interaction_shortens_banner() {
        let mut ui = RecoveryUi::new();
        assert!(!ui.note_interaction());
        ui.request_banner(BannerKind::Tab, true);
        assert!(ui.note_interaction());
        assert!(!ui.note_interaction());
    }

    #[test]
    fn toast_text_is_replaced() {
        let mut ui = RecoveryUi::new();
        assert!(ui.show_toast(armed_toast_trying(10)));
        assert!(!ui.show_toast(armed_toast_retry_later(10)));
        assert_eq!(ui.toast(), Some("Armed for 10 min. Collapse again to trigger PiP."));
        assert!(ui.hide_toast());
        assert_eq!(ui.toast(), None);
    }

    #[test]
    fn banner_messages_name_the_trigger() {
        assert!(BannerKind::Tab.message().contains("switching tabs"));
        assert!(BannerKind::Panel.message().contains("panel collapses"));
        assert!(BannerKind::Panel.message().ends_with("then try again."));
    }
}
