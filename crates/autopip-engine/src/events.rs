//! Named event channels into the Decision Engine, one variant per channel.

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use autopip_core::protocol::{Directive, Reply};
use autopip_core::types::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    MouseDown,
    KeyDown,
    TouchStart,
    Click,
}

impl InteractionKind {
    /// Kinds that cut a shown banner's lifetime short.
    pub fn dismisses_banner(self) -> bool {
        matches!(self, Self::MouseDown | Self::KeyDown)
    }
}

#[derive(Debug)]
pub enum EngineEvent {
    VisibilityChanged(Visibility),
    /// Visual or layout viewport resized.
    ViewportResized,
    FullscreenChanged,
    /// Raw user input anywhere in the document.
    Interaction(InteractionKind),
    /// Platform-fired PiP enter. Authoritative.
    PipEntered,
    /// Platform-fired PiP leave. Authoritative.
    PipLeft,
    /// A video element was added to the document.
    VideoAdded,
    /// A video started or stopped playing.
    MediaStateChanged,
    /// The site finished an in-page navigation.
    SiteNavigated,
    Directive {
        directive: Directive,
        reply: Option<oneshot::Sender<Reply>>,
    },
    /// Banner body clicked: arm and retry.
    BannerClicked,
    BannerClosed,
    /// The platform invoked the registered enter-PiP action handler.
    MediaSessionAction,
    /// Settings store change notification (`key → new value`).
    ConfigChanged(Map<String, Value>),
    /// The extension context behind this page is gone.
    ContextInvalidated,
}

impl EngineEvent {
    pub fn directive(directive: Directive) -> Self {
        Self::Directive {
            directive,
            reply: None,
        }
    }

    pub fn channel(&self) -> &'static str {
        match self {
            Self::VisibilityChanged(_) => "visibility-changed",
            Self::ViewportResized => "viewport-resized",
            Self::FullscreenChanged => "fullscreen-changed",
            Self::Interaction(_) => "interaction",
            Self::PipEntered => "media-pip-entered",
            Self::PipLeft => "media-pip-left",
            Self::VideoAdded => "video-added",
            Self::MediaStateChanged => "media-state-changed",
            Self::SiteNavigated => "site-navigated",
            Self::Directive { .. } => "message-received",
            Self::BannerClicked => "banner-clicked",
            Self::BannerClosed => "banner-closed",
            Self::MediaSessionAction => "media-session-action",
            Self::ConfigChanged(_) => "config-changed",
            Self::ContextInvalidated => "context-invalidated",
        }
    }
}
