//! Scenario Documents
//!
//! A scenario is the full initial state of a session as a JSON document:
//!
//! ```json
//! {
//!   "processes": 2,
//!   "resources": 2,
//!   "totals": [1, 1],
//!   "allocation": [[1, 0], [0, 1]],
//!   "requests": [[0, 1], [1, 0]],
//!   "prevention": false,
//!   "order": [0, 1],
//!   "wait_for": [[0, 1], [1, 0]]
//! }
//! ```
//!
//! `available`, `allocation` and `requests` may be omitted; see
//! [`EngineBuilder`] for the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    AllocationEngine, EdgeInput, EngineBuilder, EngineConfig, EngineError, ProcessId, Units,
};

/// Failures while loading a scenario
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// File could not be read
    #[error("Failed to read scenario {path}: {source}")]
    Io {
        /// Scenario path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid scenario JSON
    #[error("Malformed scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// Scenario content rejected by the engine
    #[error("Invalid scenario: {0}")]
    Engine(#[from] EngineError),
}

/// Initial session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Number of processes (`P`)
    pub processes: usize,

    /// Number of resource types (`R`)
    pub resources: usize,

    /// Total instances per resource type
    #[serde(default)]
    pub totals: Vec<Units>,

    /// Free instances; derived from totals and allocation when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<Units>>,

    /// Allocation matrix; all zeros when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<Vec<Vec<Units>>>,

    /// Request matrix; all zeros when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Vec<Units>>>,

    /// Prevention flag and resource order
    #[serde(flatten)]
    pub config: EngineConfig,

    /// Wait-for edges `[from, to]`, entered in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for: Vec<[usize; 2]>,
}

impl Scenario {
    /// Parse a scenario from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_json_str(&json)?;
        info!(
            "scenario: loaded {} ({} processes, {} resource types)",
            path.display(),
            scenario.processes,
            scenario.resources
        );
        Ok(scenario)
    }

    /// Build an engine and enter the wait-for edges
    ///
    /// Edges rejected by the order rule are skipped, matching interactive
    /// input under prevention.
    pub fn into_engine(self) -> Result<AllocationEngine, ScenarioError> {
        let mut builder = EngineBuilder::new(self.processes, self.resources)
            .totals(self.totals)
            .config(self.config);
        if let Some(available) = self.available {
            builder = builder.available(available);
        }
        if let Some(allocation) = self.allocation {
            builder = builder.allocation(allocation);
        }
        if let Some(requests) = self.requests {
            builder = builder.requests(requests);
        }

        let mut engine = builder.build()?;
        let prevention = engine.prevention_enabled();
        for [from, to] in self.wait_for {
            let input = engine.input_wait_for_edge(ProcessId(from), ProcessId(to), prevention)?;
            if input == EdgeInput::RejectedByOrderRule {
                debug!("scenario: skipped wait-for edge P{} -> P{}", from, to);
            }
        }

        Ok(engine)
    }
}
