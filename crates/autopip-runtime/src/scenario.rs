//! Replay scenarios: a step script for the simulated browser plus the
//! trace it must produce.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use autopip_core::config::Config;

use crate::sim::{DEFAULT_USER_AGENT, Simulation, Step, TraceEntry, TraceEvent};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario {name}: steps out of order at index {index}")]
    Unordered { name: String, index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectations {
    /// Events that must appear in this relative order. Others may interleave.
    #[serde(default)]
    pub sequence: Vec<TraceEvent>,
    /// Exact number of events per event name.
    #[serde(default)]
    pub counts: BTreeMap<String, usize>,
}

impl Expectations {
    pub fn check(&self, trace: &[TraceEntry]) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        let mut remaining = trace.iter();
        for (index, wanted) in self.sequence.iter().enumerate() {
            if !remaining.any(|entry| entry.event == *wanted) {
                problems.push(format!("sequence[{index}] not found in order: {wanted}"));
                break;
            }
        }

        for (name, wanted) in &self.counts {
            let got = trace.iter().filter(|e| e.event.name() == name).count();
            if got != *wanted {
                problems.push(format!("count of {name}: expected {wanted}, got {got}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Settings overlay applied on top of the base config.
    #[serde(default)]
    pub config: Map<String, Value>,
    pub user_agent: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect: Expectations,
}

/// What a replay produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay {
    pub name: String,
    pub trace: Vec<TraceEntry>,
    pub problems: Vec<String>,
}

impl Replay {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario: Self = serde_json::from_str(&text).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Steps must not go back in time.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let unordered = self
            .steps
            .windows(2)
            .position(|pair| pair[1].at < pair[0].at);
        match unordered {
            Some(index) => Err(ScenarioError::Unordered {
                name: self.name.clone(),
                index: index + 1,
            }),
            None => Ok(()),
        }
    }

    /// Effective settings: `base` with this scenario's overlay applied.
    pub fn config(&self, base: &Config) -> Config {
        let mut config = base.clone();
        let applied = config.apply_changes(&self.config);
        if applied.len() != self.config.len() {
            debug!(scenario = %self.name, ?applied, "some overlay keys were ignored");
        }
        config
    }

    pub async fn replay(&self, base: &Config) -> Replay {
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let mut sim = Simulation::new(self.config(base), user_agent);
        sim.run(&self.steps).await;
        let trace = sim.trace();
        let problems = self.expect.check(&trace).err().unwrap_or_default();
        info!(
            scenario = %self.name,
            events = trace.len(),
            passed = problems.is_empty(),
            "replay finished"
        );
        Replay {
            name: self.name.clone(),
            trace,
            problems,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
