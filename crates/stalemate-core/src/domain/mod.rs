//! Domain Layer - Deadlock Engine Assembly
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ResourceLedger             OrderingPolicy                  │
//! │  ├─ total / available       ├─ ResourceOrder (permutation)  │
//! │  └─ allocated / requested   └─ permits()                    │
//! │                                                             │
//! │  GraphBuilder               WaitForGraph                    │
//! │  └─ AdjacencyMatrix (P+R)   └─ AdjacencyMatrix (P)          │
//! │                  \              /                           │
//! │                   CycleDetector                             │
//! │                   └─ CycleRecord                            │
//! │                                                             │
//! │                   AllocationEngine                          │
//! │                   ├─ request / release                      │
//! │                   ├─ detect                                 │
//! │                   └─ resolve (kill)                         │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use stalemate_core::domain::*;
//!
//! let mut engine = EngineBuilder::new(2, 2)
//!     .totals(vec![1, 1])
//!     .allocation(vec![vec![1, 0], vec![0, 1]])
//!     .requests(vec![vec![0, 1], vec![1, 0]])
//!     .build()
//!     .unwrap();
//!
//! let cycle = engine.detect_deadlock().unwrap();
//! assert_eq!(cycle.to_string(), "P0 -> R1 -> P1 -> R0 -> P0");
//!
//! engine.resolve_deadlock(&cycle).unwrap();
//! assert!(engine.detect_deadlock().is_none());
//! ```

pub mod types;
pub mod error;
pub mod ledger;
pub mod graph;
pub mod detector;
pub mod ordering;
pub mod wait_for;
pub mod engine;

#[cfg(kani)]
mod proof;

// Re-exports
pub use types::{DetectionMode, GraphNode, ProcessId, ProcessState, ResourceId, Units};
pub use error::{EngineError, Result};
pub use ledger::{LedgerSnapshot, ResourceLedger};
pub use graph::{AdjacencyMatrix, EdgeKind, GraphBuilder, GraphEdge};
pub use detector::{CycleDetector, CycleRecord};
pub use ordering::{OrderUpdate, OrderWarning, OrderingPolicy, ResourceOrder};
pub use wait_for::{EdgeInput, WaitForGraph};
pub use engine::{AllocationEngine, EngineConfig, RequestResult, Victim};

/// Builder for an [`AllocationEngine`]
///
/// Unset matrices default to all zeros. When `available` is not given it is
/// derived as `total - Σ allocated`.
///
/// ```rust
/// use stalemate_core::domain::*;
///
/// let engine = EngineBuilder::new(1, 2)
///     .totals(vec![2, 1])
///     .prevention(true)
///     .resource_order(vec![1, 0])
///     .build()
///     .unwrap();
///
/// assert_eq!(engine.ledger().available_all(), &[2, 1]);
/// assert_eq!(engine.order().sequence(), &[1, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    num_processes: usize,
    num_resources: usize,
    totals: Option<Vec<Units>>,
    available: Option<Vec<Units>>,
    allocation: Option<Vec<Vec<Units>>>,
    requests: Option<Vec<Vec<Units>>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Create a builder for `num_processes` processes and `num_resources` types
    ///
    /// Defaults:
    /// - zero instances of every resource type
    /// - nothing allocated, nothing requested
    /// - prevention disabled, identity order
    pub fn new(num_processes: usize, num_resources: usize) -> Self {
        Self {
            num_processes,
            num_resources,
            totals: None,
            available: None,
            allocation: None,
            requests: None,
            config: EngineConfig::default(),
        }
    }

    /// Set total instances per resource type
    pub fn totals(mut self, totals: Vec<Units>) -> Self {
        self.totals = Some(totals);
        self
    }

    /// Set free instances per resource type
    pub fn available(mut self, available: Vec<Units>) -> Self {
        self.available = Some(available);
        self
    }

    /// Set the allocation matrix
    pub fn allocation(mut self, allocation: Vec<Vec<Units>>) -> Self {
        self.allocation = Some(allocation);
        self
    }

    /// Set the request matrix
    pub fn requests(mut self, requests: Vec<Vec<Units>>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Enable or disable the ordered-acquisition rule
    pub fn prevention(mut self, enabled: bool) -> Self {
        self.config.prevention = enabled;
        self
    }

    /// Set the resource order (identity when malformed)
    pub fn resource_order(mut self, order: Vec<usize>) -> Self {
        self.config.resource_order = Some(order);
        self
    }

    /// Apply a whole [`EngineConfig`]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Whatever [`ResourceLedger::new`] rejects; an `available` vector
    /// that cannot be derived because allocations exceed totals is reported
    /// as `ConservationViolated`.
    pub fn build(self) -> Result<AllocationEngine> {
        let (p, r) = (self.num_processes, self.num_resources);
        let totals = self.totals.unwrap_or_else(|| vec![0; r]);
        let allocation = self.allocation.unwrap_or_else(|| vec![vec![0; r]; p]);
        let requests = self.requests.unwrap_or_else(|| vec![vec![0; r]; p]);

        let available = match self.available {
            Some(available) => available,
            None => derive_available(&totals, &allocation)?,
        };

        let ledger = ResourceLedger::new(p, r, totals, available, allocation, requests)?;
        Ok(AllocationEngine::from_ledger(ledger, &self.config))
    }
}

/// `total[r] - Σ_i allocation[i][r]` for every resource type
fn derive_available(totals: &[Units], allocation: &[Vec<Units>]) -> Result<Vec<Units>> {
    totals
        .iter()
        .enumerate()
        .map(|(r, &total)| {
            let allocated: u64 = allocation
                .iter()
                .map(|row| u64::from(row.get(r).copied().unwrap_or(0)))
                .sum();
            u64::from(total)
                .checked_sub(allocated)
                .and_then(|free| Units::try_from(free).ok())
                .ok_or(EngineError::ConservationViolated {
                    resource: ResourceId(r),
                    available: 0,
                    allocated,
                    total: u64::from(total),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_derives_available() {
        let engine = EngineBuilder::new(2, 2)
            .totals(vec![3, 1])
            .allocation(vec![vec![1, 0], vec![1, 1]])
            .build()
            .unwrap();

        assert_eq!(engine.ledger().available_all(), &[1, 0]);
    }

    #[test]
    fn test_builder_rejects_over_allocation() {
        let result = EngineBuilder::new(1, 1)
            .totals(vec![1])
            .allocation(vec![vec![2]])
            .build();

        assert!(matches!(result, Err(EngineError::ConservationViolated { .. })));
    }

    #[test]
    fn test_builder_prevention_reaches_wait_for_graph() {
        let engine = EngineBuilder::new(2, 1).totals(vec![1]).prevention(true).build().unwrap();

        assert!(engine.prevention_enabled());
        assert!(engine.wait_for().prevention_enabled());
    }
}
