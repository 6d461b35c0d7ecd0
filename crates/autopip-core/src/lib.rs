//! autopip-core: pure decision logic for automatic Picture-in-Picture.
//!
//! Configuration shape, cross-context protocol, collapse classification,
//! video candidate selection, the PiP attempt state machine, and the
//! recovery-UI latch. No IO and no async runtime; callers pass time in as
//! epoch milliseconds.

pub mod attempt;
pub mod cache;
pub mod config;
pub mod error;
pub mod panel;
pub mod ports;
pub mod protocol;
pub mod recovery;
pub mod selector;
pub mod types;
pub mod viewport;

pub use attempt::{AttemptSkip, Effect, FailureKind, GestureAssessment, Session};
pub use cache::{ConfigCache, FreshCache};
pub use config::{Config, Feature, SiteSettings, host_of};
pub use error::{ConfigError, DeliveryError, InjectError, PipError, TabError};
pub use ports::{Clock, ConfigSource, ManualClock, StaticConfig, SystemClock};
pub use protocol::{CapabilityReply, Directive, Notification, OrchestratorInbound, Query, Reply};
pub use recovery::{BannerKind, RecoveryUi};
pub use selector::{FrameAccess, MediaState, ReadyState, VideoDocument, VideoProbe};
pub use types::{PipReason, PipState, Rect, TabId, VideoId, Viewport, Visibility, WindowId};
