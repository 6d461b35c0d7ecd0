//! autopip-engine: the per-page Decision Engine.
//!
//! Wraps the pure state machines of `autopip-core` with async port calls,
//! a timer set and a tokio run loop.

pub mod clock;
pub mod engine;
pub mod events;
pub mod platform;
pub mod timers;

pub use clock::TokioClock;
pub use engine::{AttemptOutcome, CheckSource, DecisionEngine, EnginePorts};
pub use events::{EngineEvent, InteractionKind};
pub use platform::{Notifier, PageSurface, RecoverySurface};
pub use timers::{Timer, TimerSet};
