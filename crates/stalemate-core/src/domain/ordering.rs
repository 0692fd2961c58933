//! Domain Model: Ordered Resource Acquisition
//!
//! # Prevention Rule
//!
//! Resource types are ranked by a fixed permutation of `[0, R)`. A process
//! may only request a resource whose rank is at or above the rank of every
//! resource it already holds. Circular wait needs at least one edge that
//! goes "down" the order, so enforcing the rule at request time makes
//! cycles impossible to build.
//!
//! ```text
//! order = [R1, R0]        position(R1) = 0, position(R0) = 1
//!
//! holds R0 (pos 1), requests R1 (pos 0)  => OrderViolation
//! holds R1 (pos 0), requests R0 (pos 1)  => permitted
//! holds R0 (pos 1), requests R0 (pos 1)  => permitted
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{EngineError, Result};
use super::ledger::ResourceLedger;
use super::types::{ProcessId, ResourceId};

/// Why a supplied order sequence was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum OrderWarning {
    /// Sequence length differs from the resource count
    #[error("Malformed order: {actual} entries, expected {expected}")]
    WrongLength {
        /// Resource count
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Entry is not a valid resource index
    #[error("Malformed order: entry {position} is R{value}, out of range")]
    OutOfRange {
        /// Position in the sequence
        position: usize,
        /// Offending value
        value: usize,
    },

    /// Resource index appears twice
    #[error("Malformed order: R{value} appears twice (position {position})")]
    Duplicate {
        /// Position of the second occurrence
        position: usize,
        /// Repeated value
        value: usize,
    },
}

/// Result of [`OrderingPolicy::set_order`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Whether the supplied sequence was taken as-is
    pub accepted: bool,
    /// Order in force after the call
    pub effective: Vec<usize>,
    /// Set when the sequence was rejected and identity order restored
    pub warning: Option<OrderWarning>,
}

/// A strict total order over resource types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOrder {
    /// sequence[k] = resource ranked k-th
    sequence: Vec<usize>,
    /// positions[r] = rank of resource r
    positions: Vec<usize>,
}

impl ResourceOrder {
    /// Identity order `[0, 1, .., R-1]`
    pub fn identity(num_resources: usize) -> Self {
        let sequence: Vec<usize> = (0..num_resources).collect();
        Self {
            positions: sequence.clone(),
            sequence,
        }
    }

    /// Validate `sequence` as a permutation of `[0, R)`
    pub fn from_sequence(sequence: &[usize], num_resources: usize) -> std::result::Result<Self, OrderWarning> {
        if sequence.len() != num_resources {
            return Err(OrderWarning::WrongLength {
                expected: num_resources,
                actual: sequence.len(),
            });
        }

        let mut positions = vec![usize::MAX; num_resources];
        for (position, &value) in sequence.iter().enumerate() {
            if value >= num_resources {
                return Err(OrderWarning::OutOfRange { position, value });
            }
            if positions[value] != usize::MAX {
                return Err(OrderWarning::Duplicate { position, value });
            }
            positions[value] = position;
        }

        Ok(Self {
            sequence: sequence.to_vec(),
            positions,
        })
    }

    /// Rank of `resource` (`usize::MAX` when out of range)
    #[inline]
    pub fn position(&self, resource: ResourceId) -> usize {
        self.positions
            .get(resource.as_usize())
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// Resources from lowest to highest rank
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    /// Number of ranked resources
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True when there are no resource types
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Havender ordered-acquisition policy
///
/// Pure decision rules; the engine decides when to consult them.
pub struct OrderingPolicy;

impl OrderingPolicy {
    /// Check whether `process` may request `requested` given what it holds
    ///
    /// # Errors
    ///
    /// `OrderViolation` naming the first held resource (in index order)
    /// ranked strictly above `requested`.
    pub fn permits(
        process: ProcessId,
        requested: ResourceId,
        ledger: &ResourceLedger,
        order: &ResourceOrder,
    ) -> Result<()> {
        let requested_position = order.position(requested);

        for held in ledger.held_by(process) {
            let held_position = order.position(held);
            if requested_position < held_position {
                return Err(EngineError::OrderViolation {
                    process,
                    held,
                    requested,
                    held_position,
                    requested_position,
                });
            }
        }

        Ok(())
    }

    /// Replace `order` with `sequence`, or reset it to identity
    ///
    /// A malformed sequence is not an error: identity order is restored and
    /// the reason is returned as a warning.
    pub fn set_order(order: &mut ResourceOrder, sequence: &[usize], num_resources: usize) -> OrderUpdate {
        match ResourceOrder::from_sequence(sequence, num_resources) {
            Ok(accepted) => {
                *order = accepted;
                OrderUpdate {
                    accepted: true,
                    effective: order.sequence().to_vec(),
                    warning: None,
                }
            }
            Err(warning) => {
                warn!("ordering: {}; falling back to identity order", warning);
                *order = ResourceOrder::identity(num_resources);
                OrderUpdate {
                    accepted: false,
                    effective: order.sequence().to_vec(),
                    warning: Some(warning),
                }
            }
        }
    }
}
