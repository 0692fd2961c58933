//! Wait-For Graph - Process-Only Deadlock Model
//!
//! Edges are supplied by the caller rather than derived: `i -> j` means
//! process `i` waits on a resource held by process `j`.
//!
//! # Prevention Mode
//!
//! With prevention enabled, a process may only wait on a process with a
//! strictly greater index. Offending edges are dropped as they are entered,
//! never removed after the fact, so the graph stays acyclic by construction.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::detector::{CycleDetector, CycleRecord};
use super::error::{EngineError, Result};
use super::graph::AdjacencyMatrix;
use super::types::ProcessId;

/// Outcome of entering a wait-for edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeInput {
    /// Edge is now part of the graph
    Added,
    /// Prevention is on and the edge points to a lower or equal index
    RejectedByOrderRule,
}

/// `P x P` wait-for adjacency with optional input-time ordering rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitForGraph {
    matrix: AdjacencyMatrix,
    prevention: bool,
}

impl WaitForGraph {
    /// Create an edgeless graph over `num_processes` processes
    pub fn new(num_processes: usize) -> Self {
        Self {
            matrix: AdjacencyMatrix::new(num_processes),
            prevention: false,
        }
    }

    /// Build a graph from a 0/1 matrix, entering edges row by row
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the matrix is not square or holds values other
    /// than 0 and 1.
    pub fn from_matrix(rows: &[Vec<u8>], prevention: bool) -> Result<Self> {
        let n = rows.len();
        let mut graph = Self::new(n);
        graph.prevention = prevention;

        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(EngineError::InvalidArgument(format!(
                    "wait-for row P{i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            for (j, &cell) in row.iter().enumerate() {
                match cell {
                    0 => {}
                    1 => {
                        graph.add_edge(ProcessId(i), ProcessId(j))?;
                    }
                    other => {
                        return Err(EngineError::InvalidArgument(format!(
                            "wait-for entry P{i}->P{j} is {other}, expected 0 or 1"
                        )));
                    }
                }
            }
        }

        Ok(graph)
    }

    /// Number of processes
    pub fn num_processes(&self) -> usize {
        self.matrix.size()
    }

    /// Underlying adjacency matrix
    pub fn adjacency(&self) -> &AdjacencyMatrix {
        &self.matrix
    }

    /// Whether the input-time ordering rule is active
    pub fn prevention_enabled(&self) -> bool {
        self.prevention
    }

    /// Toggle the input-time ordering rule for subsequent edges
    pub fn set_prevention(&mut self, enabled: bool) {
        self.prevention = enabled;
    }

    /// Enter `from -> to` under the graph's own prevention setting
    pub fn add_edge(&mut self, from: ProcessId, to: ProcessId) -> Result<EdgeInput> {
        self.input_edge(from, to, self.prevention)
    }

    /// Enter `from -> to` under an explicit prevention setting
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either process is out of range.
    pub fn input_edge(&mut self, from: ProcessId, to: ProcessId, prevention: bool) -> Result<EdgeInput> {
        let (i, j) = (self.check(from)?, self.check(to)?);

        if prevention && j <= i {
            warn!("wait-for: {} -> {} rejected by order rule", from, to);
            return Ok(EdgeInput::RejectedByOrderRule);
        }

        self.matrix.add_edge(i, j);
        debug!("wait-for: {} -> {}", from, to);
        Ok(EdgeInput::Added)
    }

    /// Remove `from -> to` if present
    pub fn remove_edge(&mut self, from: ProcessId, to: ProcessId) -> Result<()> {
        let (i, j) = (self.check(from)?, self.check(to)?);
        self.matrix.remove_edge(i, j);
        Ok(())
    }

    /// Drop every edge into and out of `process`
    pub fn remove_process(&mut self, process: ProcessId) -> Result<()> {
        let p = self.check(process)?;
        self.matrix.isolate(p);
        Ok(())
    }

    /// Whether `from` waits on `to`
    pub fn waits_on(&self, from: ProcessId, to: ProcessId) -> bool {
        self.matrix.has_edge(from.as_usize(), to.as_usize())
    }

    /// All edges in row-major order
    pub fn edges(&self) -> Vec<(ProcessId, ProcessId)> {
        (0..self.matrix.size())
            .flat_map(|i| self.matrix.successors(i).map(move |j| (ProcessId(i), ProcessId(j))))
            .collect()
    }

    /// Find the first cycle, if any
    pub fn detect(&self) -> Option<CycleRecord> {
        CycleDetector::detect(&self.matrix, self.matrix.size())
    }

    fn check(&self, process: ProcessId) -> Result<usize> {
        let p = process.as_usize();
        if p >= self.matrix.size() {
            return Err(EngineError::InvalidArgument(format!(
                "process {process} out of range (P = {})",
                self.matrix.size()
            )));
        }
        Ok(p)
    }
}
