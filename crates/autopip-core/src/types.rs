use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Identifiers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

/// Handle for a video element, stable for the life of the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub u64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

// ─── Trigger reason ───────────────────────────────────────────────

/// What caused a PiP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipReason {
    TabSwitch,
    Collapse,
    /// Directive received without an explicit reason.
    Background,
    /// Retry issued from the arm click itself.
    Armed,
    /// The platform's own PiP action handler fired.
    MediaSession,
}

impl PipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TabSwitch => "tabSwitch",
            Self::Collapse => "collapse",
            Self::Background => "background",
            Self::Armed => "armed",
            Self::MediaSession => "mediaSession",
        }
    }

    /// Reasons whose call site already carries gesture attribution.
    pub fn carries_gesture(self) -> bool {
        matches!(self, Self::Armed | Self::MediaSession)
    }
}

impl fmt::Display for PipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipReason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tabSwitch" => Ok(Self::TabSwitch),
            "collapse" => Ok(Self::Collapse),
            "background" => Ok(Self::Background),
            "armed" => Ok(Self::Armed),
            "mediaSession" => Ok(Self::MediaSession),
            _ => Err(UnknownReason(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pip reason: {0}")]
pub struct UnknownReason(pub String);

// ─── Page visibility ──────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

// ─── Geometry ─────────────────────────────────────────────────────

/// Visible viewport size in whole CSS pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round fractional platform dimensions; negatives clamp to zero.
    pub fn from_css(width: f64, height: f64) -> Self {
        Self {
            width: round_px(width),
            height: round_px(height),
        }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn round_px(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Element bounding box relative to the layout viewport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// `max(0, w) * max(0, h)`.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Whether any part of the box lies inside `viewport`.
    pub fn intersects(&self, viewport: Viewport) -> bool {
        self.bottom() > 0.0
            && self.right() > 0.0
            && self.top < f64::from(viewport.height)
            && self.left < f64::from(viewport.width)
    }
}

// ─── PiP state ────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipState {
    #[default]
    Idle,
    /// An attempt passed the throttle and is in flight.
    AttemptPending,
    InPip,
    /// Last attempt was refused for lack of a user gesture.
    Blocked,
}

// ─── Tests ────────────────────────────────────────────────────────
