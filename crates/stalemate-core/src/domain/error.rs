//! Domain Model: Engine Error Types
//!
//! Every error leaves the ledger in the state it had before the call.
//! None of them is fatal; the caller may keep issuing operations.

use super::types::{ProcessId, ResourceId, Units};

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine Error Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors surfaced by the ledger, the ordering policy and the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Caller Errors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Out-of-range index, zero unit count or mis-shaped input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Ledger precondition violated (e.g. releasing more than is held)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Request issued by a process killed during resolution
    #[error("Process {0} has been terminated")]
    ProcessTerminated(ProcessId),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Denials
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Request would acquire resources out of the fixed total order
    #[error(
        "Order violation: {process} holds {held} (position {held_position}) \
         and cannot request {requested} (position {requested_position})"
    )]
    OrderViolation {
        /// Requesting process
        process: ProcessId,
        /// Held resource ranking above the requested one
        held: ResourceId,
        /// Resource being requested
        requested: ResourceId,
        /// Order position of `held`
        held_position: usize,
        /// Order position of `requested`
        requested_position: usize,
    },

    /// Not enough free instances; recoverable by retrying after a release
    #[error("Insufficient resources: {requested} of {resource} requested, {available} available")]
    InsufficientResources {
        /// Resource type requested
        resource: ResourceId,
        /// Units requested
        requested: Units,
        /// Units free at the time of the request
        available: Units,
    },

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // State Integrity
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Cycle record refers to nodes outside the current graph
    #[error("Stale cycle record: node {node} is outside a graph of {node_count} nodes")]
    StaleCycle {
        /// Offending raw node index
        node: usize,
        /// Node count of the current graph
        node_count: usize,
    },

    /// `available + Σ allocated != total` for a resource type
    #[error(
        "Conservation violated for {resource}: available {available} + allocated {allocated} != total {total}"
    )]
    ConservationViolated {
        /// Unbalanced resource type
        resource: ResourceId,
        /// Free instances
        available: u64,
        /// Sum of allocations across processes
        allocated: u64,
        /// Declared total
        total: u64,
    },
}

impl EngineError {
    /// Check if the error is a denial the caller may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientResources { .. })
    }

    /// Check if the error is an ordering-policy rejection
    pub fn is_order_violation(&self) -> bool {
        matches!(self, Self::OrderViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_violation_message_names_pair() {
        let err = EngineError::OrderViolation {
            process: ProcessId(0),
            held: ResourceId(0),
            requested: ResourceId(1),
            held_position: 1,
            requested_position: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("P0 holds R0"));
        assert!(msg.contains("cannot request R1"));
        assert!(err.is_order_violation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_insufficient_is_retryable() {
        let err = EngineError::InsufficientResources {
            resource: ResourceId(2),
            requested: 3,
            available: 1,
        };
        assert!(err.is_retryable());
    }
}
