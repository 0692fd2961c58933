//! AllocationEngine - Request / Release / Kill Orchestration
//!
//! # Data Flow
//!
//! ```text
//! request ──▶ validate ──▶ OrderingPolicy ──▶ ResourceLedger ──▶ GraphBuilder
//!                              (prevention)         │                 │
//!                                                   ▼                 ▼
//!                                           grant / record      AdjacencyMatrix
//!                                                                     │
//! detect ─────────────────────────────────────────────▶ CycleDetector ◀┘
//!                                                             │
//! resolve ◀──────────────────── CycleRecord ◀─────────────────┘
//! ```
//!
//! The engine owns the ledger, the resource order and the session's
//! wait-for graph. The allocation graph is cached and rebuilt after every
//! mutation; it is never edited in place.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::detector::{CycleDetector, CycleRecord};
use super::error::{EngineError, Result};
use super::graph::{AdjacencyMatrix, GraphBuilder, GraphEdge};
use super::ledger::{check_units, LedgerSnapshot, ResourceLedger};
use super::ordering::{OrderUpdate, OrderingPolicy, ResourceOrder};
use super::types::{DetectionMode, GraphNode, ProcessId, ProcessState, ResourceId, Units};
use super::wait_for::{EdgeInput, WaitForGraph};

/// Session options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Apply the ordered-acquisition rule to every request
    pub prevention: bool,

    /// Resource order; identity when absent or malformed
    #[serde(alias = "order")]
    pub resource_order: Option<Vec<usize>>,
}

/// Outcome of a request that passed validation and the ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestResult {
    /// Instances moved to the process
    Granted,

    /// Not enough free instances; the request is recorded as pending
    Denied {
        /// Resource type requested
        resource: ResourceId,
        /// Units requested
        requested: Units,
        /// Units free at the time
        available: Units,
    },
}

impl RequestResult {
    /// Denial reason as an `InsufficientResources` error
    pub fn denial(&self) -> Option<EngineError> {
        match *self {
            Self::Granted => None,
            Self::Denied {
                resource,
                requested,
                available,
            } => Some(EngineError::InsufficientResources {
                resource,
                requested,
                available,
            }),
        }
    }

    /// Check if the request was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// A process killed during resolution and what it gave back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victim {
    /// Terminated process
    pub process: ProcessId,
    /// Units released per resource type
    pub released: Vec<Units>,
}

/// Deadlock engine for one session of `P` processes and `R` resource types
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    ledger: ResourceLedger,
    order: ResourceOrder,
    prevention: bool,
    states: Vec<ProcessState>,
    wait_for: WaitForGraph,
    graph: AdjacencyMatrix,
}

impl AllocationEngine {
    /// Create an engine over caller-supplied state
    ///
    /// Prevention is off and the resource order is the identity.
    ///
    /// # Errors
    ///
    /// Whatever [`ResourceLedger::new`] rejects.
    pub fn initialize(
        num_processes: usize,
        num_resources: usize,
        totals: Vec<Units>,
        available: Vec<Units>,
        allocation: Vec<Vec<Units>>,
        requests: Vec<Vec<Units>>,
    ) -> Result<Self> {
        let ledger = ResourceLedger::new(
            num_processes,
            num_resources,
            totals,
            available,
            allocation,
            requests,
        )?;
        Ok(Self::from_ledger(ledger, &EngineConfig::default()))
    }

    /// Wrap an existing ledger
    ///
    /// A malformed `config.resource_order` falls back to identity with a
    /// logged warning; call [`Self::set_order`] to receive the warning.
    pub fn from_ledger(ledger: ResourceLedger, config: &EngineConfig) -> Self {
        let num_processes = ledger.num_processes();
        let mut order = ResourceOrder::identity(ledger.num_resources());
        if let Some(sequence) = &config.resource_order {
            OrderingPolicy::set_order(&mut order, sequence, ledger.num_resources());
        }

        let graph = GraphBuilder::build(&ledger);
        info!(
            "engine: session with {} processes, {} resource types (prevention: {})",
            num_processes,
            ledger.num_resources(),
            config.prevention
        );

        let mut wait_for = WaitForGraph::new(num_processes);
        wait_for.set_prevention(config.prevention);

        Self {
            ledger,
            order,
            prevention: config.prevention,
            states: vec![ProcessState::Idle; num_processes],
            wait_for,
            graph,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Current ledger
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Copy of the ledger's matrices
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Resource order in force
    pub fn order(&self) -> &ResourceOrder {
        &self.order
    }

    /// Allocation graph as of the last mutation
    pub fn graph(&self) -> &AdjacencyMatrix {
        &self.graph
    }

    /// Labelled allocation-graph edges for renderers
    pub fn graph_edges(&self) -> Vec<GraphEdge> {
        GraphBuilder::edges(&self.ledger)
    }

    /// Session wait-for graph
    pub fn wait_for(&self) -> &WaitForGraph {
        &self.wait_for
    }

    /// Whether the ordering rule is applied to requests
    pub fn prevention_enabled(&self) -> bool {
        self.prevention
    }

    /// Turn the ordering rule on or off for requests and wait-for input
    pub fn set_prevention(&mut self, enabled: bool) {
        self.prevention = enabled;
        self.wait_for.set_prevention(enabled);
    }

    /// Lifecycle state of `process`
    pub fn state(&self, process: ProcessId) -> Result<ProcessState> {
        let p = self.ledger.check_process(process)?;
        Ok(self.states[p])
    }

    /// Processes killed so far, ascending
    pub fn terminated(&self) -> Vec<ProcessId> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_terminated())
            .map(|(p, _)| ProcessId(p))
            .collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Replace the resource order (identity on malformed input)
    pub fn set_order(&mut self, sequence: &[usize]) -> OrderUpdate {
        OrderingPolicy::set_order(&mut self.order, sequence, self.ledger.num_resources())
    }

    /// Ask for `units` instances of `resource` on behalf of `process`
    ///
    /// # Steps
    ///
    /// 1. Bounds and unit checks (`InvalidArgument`)
    /// 2. Terminated processes are refused (`ProcessTerminated`)
    /// 3. With prevention on, the ordering rule (`OrderViolation`)
    /// 4. Grant if enough instances are free, otherwise record the request
    ///    as pending and return `Denied`
    ///
    /// Steps 1-3 never mutate state.
    pub fn request_resource(
        &mut self,
        process: ProcessId,
        resource: ResourceId,
        units: Units,
    ) -> Result<RequestResult> {
        let p = self.check_live(process)?;
        self.ledger.check_resource(resource)?;
        check_units(units)?;

        if self.prevention {
            if let Err(violation) = OrderingPolicy::permits(process, resource, &self.ledger, &self.order) {
                warn!("engine: {}", violation);
                return Err(violation);
            }
        }

        self.states[p] = ProcessState::Requesting;
        let available = self.ledger.available(resource);

        let result = if available >= units {
            self.ledger.grant(process, resource, units)?;
            self.states[p] = ProcessState::Granted;
            info!("engine: granted {} x{} to {}", resource, units, process);
            RequestResult::Granted
        } else {
            self.ledger.set_request(process, resource, units)?;
            self.states[p] = ProcessState::Denied;
            warn!(
                "engine: denied {} x{} to {} ({} available)",
                resource, units, process, available
            );
            RequestResult::Denied {
                resource,
                requested: units,
                available,
            }
        };

        self.rebuild_graph();
        Ok(result)
    }

    /// Record a pending request without attempting to grant it
    ///
    /// Overwrites any earlier request of `process` for `resource`;
    /// `units == 0` clears it.
    pub fn record_request(&mut self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        self.check_live(process)?;
        self.ledger.set_request(process, resource, units)?;
        self.rebuild_graph();
        Ok(())
    }

    /// Give back `units` instances of `resource` held by `process`
    ///
    /// Deadlock detection is not re-run; the caller decides when to detect.
    pub fn release_resource(&mut self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        self.ledger.check_process(process)?;
        self.ledger.release(process, resource, units)?;
        info!("engine: {} released {} x{}", process, resource, units);
        self.rebuild_graph();
        Ok(())
    }

    /// Enter a wait-for edge `from -> to`
    ///
    /// `prevention` applies the `to > from` rule to this edge only.
    pub fn input_wait_for_edge(&mut self, from: ProcessId, to: ProcessId, prevention: bool) -> Result<EdgeInput> {
        self.check_live(from)?;
        self.check_live(to)?;
        self.wait_for.input_edge(from, to, prevention)
    }

    /// Look for a cycle in the allocation graph
    pub fn detect_deadlock(&self) -> Option<CycleRecord> {
        self.detect_deadlock_in(DetectionMode::AllocationGraph)
    }

    /// Look for a cycle in the chosen graph; never mutates
    pub fn detect_deadlock_in(&self, mode: DetectionMode) -> Option<CycleRecord> {
        let record = match mode {
            DetectionMode::AllocationGraph => {
                let graph = GraphBuilder::build(&self.ledger);
                CycleDetector::detect(&graph, self.ledger.num_processes())
            }
            DetectionMode::WaitForGraph => self.wait_for.detect(),
        };

        match &record {
            Some(cycle) => info!("engine: deadlock in {}: {}", mode, cycle),
            None => debug!("engine: no deadlock in {}", mode),
        }
        record
    }

    /// Kill every process on `record`'s cycle
    ///
    /// Victims are killed in ascending index order, each exactly once. The
    /// record is checked against the current dimensions first; a stale
    /// record is rejected before anything is released.
    ///
    /// # Errors
    ///
    /// `StaleCycle` if the record does not fit the current session.
    pub fn resolve_deadlock(&mut self, record: &CycleRecord) -> Result<Vec<Victim>> {
        let victims = self.validate_record(record)?;

        let mut killed = Vec::with_capacity(victims.len());
        for process in victims {
            killed.push(self.kill(process)?);
        }

        self.rebuild_graph();
        debug_assert!(self.ledger.check_conservation().is_ok());
        Ok(killed)
    }

    /// Terminate `process`, releasing everything it holds
    ///
    /// Idempotent: killing a terminated process releases nothing.
    pub fn kill(&mut self, process: ProcessId) -> Result<Victim> {
        let p = self.ledger.check_process(process)?;

        let released = self.ledger.force_release_all(process)?;
        self.wait_for.remove_process(process)?;
        self.states[p] = ProcessState::Terminated;

        info!("engine: terminated {} (released {:?})", process, released);
        self.rebuild_graph();
        Ok(Victim { process, released })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Internals
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn check_live(&self, process: ProcessId) -> Result<usize> {
        let p = self.ledger.check_process(process)?;
        if self.states[p].is_terminated() {
            return Err(EngineError::ProcessTerminated(process));
        }
        Ok(p)
    }

    /// Distinct victims of a record, or `StaleCycle`
    fn validate_record(&self, record: &CycleRecord) -> Result<BTreeSet<ProcessId>> {
        let num_processes = self.ledger.num_processes();
        let node_count = num_processes + self.ledger.num_resources();

        if record.num_processes() != num_processes {
            return Err(EngineError::StaleCycle {
                node: record.num_processes(),
                node_count: num_processes,
            });
        }

        let mut victims = BTreeSet::new();
        for &node in record.path().iter().chain(std::iter::once(&record.closing())) {
            if node >= node_count {
                return Err(EngineError::StaleCycle { node, node_count });
            }
            if let GraphNode::Process(process) = GraphNode::from_index(node, num_processes) {
                victims.insert(process);
            }
        }
        Ok(victims)
    }

    fn rebuild_graph(&mut self) {
        self.graph = GraphBuilder::build(&self.ledger);
    }
}
