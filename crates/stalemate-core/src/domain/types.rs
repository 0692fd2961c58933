//! Core Types for Deadlock Analysis

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of resource instances (held, requested or available)
pub type Units = u32;

/// Process identifier, an index in `[0, P)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// Create a new process identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Resource type identifier, an index in `[0, R)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub usize);

impl ResourceId {
    /// Create a new resource identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A node of the allocation graph
///
/// # Index Layout
///
/// ```text
/// 0 .. P        Process(0) .. Process(P-1)
/// P .. P + R    Resource(0) .. Resource(R-1)
/// ```
///
/// Wait-for graphs only contain process nodes, so every index maps to
/// `Process(i)` when `num_processes` equals the node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GraphNode {
    /// Process node
    Process(ProcessId),
    /// Resource type node
    Resource(ResourceId),
}

impl GraphNode {
    /// Map a raw matrix index to a node
    #[inline]
    pub const fn from_index(index: usize, num_processes: usize) -> Self {
        if index < num_processes {
            Self::Process(ProcessId(index))
        } else {
            Self::Resource(ResourceId(index - num_processes))
        }
    }

    /// Map a node back to its raw matrix index
    #[inline]
    pub const fn index(self, num_processes: usize) -> usize {
        match self {
            Self::Process(p) => p.0,
            Self::Resource(r) => num_processes + r.0,
        }
    }

    /// The process behind this node, if it is one
    #[inline]
    pub const fn process(self) -> Option<ProcessId> {
        match self {
            Self::Process(p) => Some(p),
            Self::Resource(_) => None,
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(p) => fmt::Display::fmt(p, f),
            Self::Resource(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// Per-process lifecycle state
///
/// ```text
/// Idle ──request──▶ Requesting ──▶ Granted | Denied
///   │                                  │
///   └──────────────kill────────────────┴──▶ Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// No request issued yet
    #[default]
    Idle,
    /// A request is being evaluated
    Requesting,
    /// Last request was granted
    Granted,
    /// Last request was denied for lack of instances
    Denied,
    /// Killed to break a deadlock; excluded from future requests
    Terminated,
}

impl ProcessState {
    /// Check if the process has been killed
    #[inline]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Which graph a detection pass runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// Bipartite process/resource graph derived from the ledger
    #[default]
    AllocationGraph,
    /// Process-only graph supplied edge by edge
    WaitForGraph,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationGraph => write!(f, "allocation-graph"),
            Self::WaitForGraph => write!(f, "wait-for-graph"),
        }
    }
}
