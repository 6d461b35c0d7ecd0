//! Error kinds surfaced by the platform-facing ports.
//!
//! None of these escalate: callers map each kind to a logged no-op or to
//! the recovery banner.

use thiserror::Error;

use crate::types::TabId;

/// Why a request to enter or leave picture-in-picture was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipError {
    /// The call was not attributed to a recent user gesture.
    #[error("picture-in-picture requires a user gesture")]
    NoUserGesture,

    #[error("picture-in-picture is not supported here")]
    NotSupported,

    #[error("invalid media state: {0}")]
    InvalidState(String),

    #[error("platform error: {0}")]
    Platform(String),
}

impl PipError {
    /// True for the one rejection kind the recovery flow reacts to.
    pub fn is_gesture_rejection(&self) -> bool {
        matches!(self, Self::NoUserGesture)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("config store unavailable: {0}")]
    Unavailable(String),

    #[error("extension context invalidated")]
    ContextInvalidated,

    #[error("config parse error: {0}")]
    Parse(String),
}

/// Failure to hand a message to another execution context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no receiver listening")]
    NoReceiver,

    #[error("tab closed")]
    TabClosed,

    #[error("extension context invalidated")]
    ContextInvalidated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("tab {0} not found")]
    NotFound(TabId),

    #[error("tab platform error: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    /// Nothing to inject into (e.g. a browser-internal page).
    #[error("tab has no injectable content")]
    NoContent,

    #[error("injection denied: {0}")]
    Denied(String),

    #[error("tab closed")]
    TabClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_no_user_gesture_is_a_gesture_rejection() {
        assert!(PipError::NoUserGesture.is_gesture_rejection());
        assert!(!PipError::NotSupported.is_gesture_rejection());
        assert!(!PipError::InvalidState("metadata".into()).is_gesture_rejection());
        assert!(!PipError::Platform("boom".into()).is_gesture_rejection());
    }

    #[test]
    fn tab_error_display_includes_id() {
        let msg = TabError::NotFound(TabId(42)).to_string();
        assert!(msg.contains("42"));
    }
}
