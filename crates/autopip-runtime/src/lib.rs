//! autopip-runtime: settings files and the simulated browser behind the
//! `autopip` binary.

pub mod config_file;
pub mod scenario;
pub mod sim;

pub use scenario::{Expectations, Replay, Scenario, ScenarioError};
pub use sim::{Action, Simulation, Step, TraceEntry, TraceEvent};
