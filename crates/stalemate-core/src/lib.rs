//! Stalemate Deadlock Engine
//!
//! # Overview
//!
//! `stalemate-core` tracks how processes hold and request instances of
//! resource types, and answers three questions about that state:
//!
//! - **Detection**: is there a circular wait?
//! - **Prevention**: would this request break the global resource order?
//! - **Resolution**: which processes must be killed to break a cycle?
//!
//! # Trinity Architecture
//!
//! This crate follows the Trinity Architecture pattern:
//!
//! - **Domain**: ledger, graphs, detector, ordering policy and engine
//! - **Infrastructure**: JSON scenario documents
//! - **Adapters**: a lock-protected handle for multi-threaded callers
//!
//! # Invariants
//!
//! - **Conservation**: `available[r] + Σ allocated[i][r] == total[r]` after
//!   every successful operation
//! - **Atomicity**: a rejected request or release leaves the ledger unchanged
//! - **Closed walk**: every reported cycle follows existing edges and ends
//!   where it started
//! - **Read-only detection**: detecting never mutates the engine
//!
//! # Usage
//!
//! ```rust
//! use stalemate_core::{DetectionMode, EngineBuilder, ProcessId, ResourceId};
//!
//! let mut engine = EngineBuilder::new(2, 2).totals(vec![1, 1]).build().unwrap();
//!
//! engine.request_resource(ProcessId(0), ResourceId(0), 1).unwrap();
//! engine.request_resource(ProcessId(1), ResourceId(1), 1).unwrap();
//! engine.request_resource(ProcessId(0), ResourceId(1), 1).unwrap();
//! engine.request_resource(ProcessId(1), ResourceId(0), 1).unwrap();
//!
//! let cycle = engine.detect_deadlock_in(DetectionMode::AllocationGraph).unwrap();
//! assert_eq!(cycle.processes(), vec![ProcessId(0), ProcessId(1)]);
//! ```
//!
//! # Feature Flags
//!
//! - `kani`: Kani proofs in `domain::proof` (built by `cargo kani`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Trinity Architecture Layers
pub mod domain;
pub mod infrastructure;
pub mod adapters;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Identifiers
pub use domain::{DetectionMode, GraphNode, ProcessId, ProcessState, ResourceId, Units};

// Errors
pub use domain::{EngineError, Result};

// Engine
pub use domain::{
    AllocationEngine,
    CycleRecord,
    EngineBuilder,
    EngineConfig,
    RequestResult,
    Victim,
};

// Scenario loading and sharing
pub use infrastructure::{Scenario, ScenarioError};
pub use adapters::SharedEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defined() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_primary_types_exported() {
        let _p = ProcessId::new(0);
        let _r = ResourceId::new(0);
        let _state = ProcessState::Idle;
        let _mode = DetectionMode::default();
        let _config = EngineConfig::default();
    }
}
