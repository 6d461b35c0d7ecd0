//! autopip-orchestrator: one coordinator per browser session.
//!
//! Tracks tab focus, makes sure the tab just left runs a Decision Engine,
//! and forwards it a `tryPiP` directive. Also answers the capability query.

pub mod coordinator;
pub mod platform;

pub use coordinator::{Activation, OrchestratorEvent, TabCoordinator};
pub use platform::{TabInfo, TabPlatform, TabStatus, WindowInfo};
