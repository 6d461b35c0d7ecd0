//! Ports between the Decision Engine and the page it runs in.

use async_trait::async_trait;

use autopip_core::error::{DeliveryError, PipError};
use autopip_core::protocol::Notification;
use autopip_core::recovery::BannerKind;
use autopip_core::selector::VideoDocument;
use autopip_core::types::{VideoId, Viewport, Visibility};

/// Media and document surface of one page.
#[async_trait]
pub trait PageSurface: VideoDocument + Send + Sync {
    /// Host of the page address, empty when it has none.
    fn host(&self) -> String;
    fn user_agent(&self) -> String;
    /// Whether the vendor API object is exposed to the page.
    fn has_vendor_object(&self) -> bool;

    /// Visual viewport, when the page exposes one.
    fn visual_viewport(&self) -> Option<Viewport>;
    fn layout_viewport(&self) -> Viewport;
    fn visibility(&self) -> Visibility;

    /// Whether some element of this page is currently in PiP.
    fn pip_active(&self) -> bool;
    async fn request_pip(&self, video: VideoId) -> Result<(), PipError>;
    async fn exit_pip(&self) -> Result<(), PipError>;

    /// Whether media controls accept a native enter-PiP action handler.
    fn supports_pip_action(&self) -> bool {
        false
    }
    fn set_pip_action_handler(&self, _registered: bool) {}
}

/// Rendering of the recovery banner and the arm toast.
pub trait RecoverySurface: Send + Sync {
    fn show_banner(&self, kind: BannerKind);
    fn hide_banner(&self);
    fn show_toast(&self, text: &str);
    fn hide_toast(&self);
}

/// One-way channel to the Orchestrator. Callers never act on the outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError>;
}
