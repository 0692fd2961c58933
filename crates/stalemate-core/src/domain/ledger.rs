//! ResourceLedger - Single Source of Truth for Instance Counts
//!
//! # Invariant
//!
//! For every resource type `j`:
//!
//! ```text
//! available[j] + Σ_i allocated[i][j] == total[j]
//! ```
//!
//! Every mutating method checks its preconditions before touching any
//! counter, so a failed call leaves the ledger exactly as it was.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{EngineError, Result};
use super::types::{ProcessId, ResourceId, Units};

/// Instance accounting for `P` processes and `R` resource types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLedger {
    num_processes: usize,
    num_resources: usize,

    /// total[r], constant after construction
    total: Vec<Units>,

    /// available[r], `0 <= available[r] <= total[r]`
    available: Vec<Units>,

    /// allocated[p][r]
    allocated: Vec<Vec<Units>>,

    /// requested[p][r], one pending request per (p, r)
    requested: Vec<Vec<Units>>,
}

/// Owned copy of the ledger's matrices for rendering or serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Total instances per resource type
    pub total: Vec<Units>,
    /// Free instances per resource type
    pub available: Vec<Units>,
    /// Allocation matrix, one row per process
    pub allocated: Vec<Vec<Units>>,
    /// Request matrix, one row per process
    pub requested: Vec<Vec<Units>>,
}

impl ResourceLedger {
    /// Build a ledger from caller-supplied vectors and matrices
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: a vector or matrix does not match `P` / `R`, or
    ///   `available[r] > total[r]`
    /// - `ConservationViolated`: the supplied counts do not balance
    pub fn new(
        num_processes: usize,
        num_resources: usize,
        total: Vec<Units>,
        available: Vec<Units>,
        allocated: Vec<Vec<Units>>,
        requested: Vec<Vec<Units>>,
    ) -> Result<Self> {
        check_len("totals", total.len(), num_resources)?;
        check_len("available", available.len(), num_resources)?;
        check_matrix("allocation", &allocated, num_processes, num_resources)?;
        check_matrix("requests", &requested, num_processes, num_resources)?;

        for (r, (&free, &all)) in available.iter().zip(&total).enumerate() {
            if free > all {
                return Err(EngineError::InvalidArgument(format!(
                    "available instances of R{r} ({free}) exceed total ({all})"
                )));
            }
        }

        let ledger = Self {
            num_processes,
            num_resources,
            total,
            available,
            allocated,
            requested,
        };
        ledger.check_conservation()?;
        Ok(ledger)
    }

    /// Build a ledger where every instance is free and nothing is requested
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `total.len() != num_resources`
    pub fn empty(num_processes: usize, num_resources: usize, total: Vec<Units>) -> Result<Self> {
        let available = total.clone();
        Self::new(
            num_processes,
            num_resources,
            total,
            available,
            vec![vec![0; num_resources]; num_processes],
            vec![vec![0; num_resources]; num_processes],
        )
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Number of processes (`P`)
    #[inline]
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Number of resource types (`R`)
    #[inline]
    pub fn num_resources(&self) -> usize {
        self.num_resources
    }

    /// Total instances of every resource type
    pub fn totals(&self) -> &[Units] {
        &self.total
    }

    /// Free instances of every resource type
    pub fn available_all(&self) -> &[Units] {
        &self.available
    }

    /// Free instances of `resource` (0 when out of range)
    pub fn available(&self, resource: ResourceId) -> Units {
        self.available.get(resource.as_usize()).copied().unwrap_or(0)
    }

    /// Units of `resource` held by `process` (0 when out of range)
    pub fn allocated(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.allocated
            .get(process.as_usize())
            .and_then(|row| row.get(resource.as_usize()))
            .copied()
            .unwrap_or(0)
    }

    /// Units of `resource` requested by `process` (0 when out of range)
    pub fn requested(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.requested
            .get(process.as_usize())
            .and_then(|row| row.get(resource.as_usize()))
            .copied()
            .unwrap_or(0)
    }

    /// Allocation row of a process
    pub fn allocation_row(&self, process: ProcessId) -> Result<&[Units]> {
        let p = self.check_process(process)?;
        Ok(&self.allocated[p])
    }

    /// Request row of a process
    pub fn request_row(&self, process: ProcessId) -> Result<&[Units]> {
        let p = self.check_process(process)?;
        Ok(&self.requested[p])
    }

    /// Resource types the process currently holds, in index order
    pub fn held_by(&self, process: ProcessId) -> impl Iterator<Item = ResourceId> + '_ {
        self.allocated
            .get(process.as_usize())
            .into_iter()
            .flat_map(|row| row.iter().enumerate())
            .filter(|&(_, &units)| units > 0)
            .map(|(r, _)| ResourceId(r))
    }

    /// Copy the current matrices out of the ledger
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total: self.total.clone(),
            available: self.available.clone(),
            allocated: self.allocated.clone(),
            requested: self.requested.clone(),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Move `units` free instances of `resource` to `process`
    ///
    /// Clears the process's pending request for `resource`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: index out of range or `units == 0`
    /// - `InvalidOperation`: `available[resource] < units`
    pub fn grant(&mut self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        let (p, r) = self.check_pair(process, resource)?;
        check_units(units)?;

        if self.available[r] < units {
            return Err(EngineError::InvalidOperation(format!(
                "cannot grant {units} of {resource} to {process}: only {} available",
                self.available[r]
            )));
        }
        let held = self.allocated[p][r].checked_add(units).ok_or_else(|| {
            EngineError::InvalidOperation(format!("allocation of {resource} to {process} overflows"))
        })?;

        self.available[r] -= units;
        self.allocated[p][r] = held;
        self.requested[p][r] = 0;

        debug!("ledger: granted {} x{} to {}", resource, units, process);
        Ok(())
    }

    /// Return `units` held instances of `resource` to the free pool
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: index out of range or `units == 0`
    /// - `InvalidOperation`: `allocated[process][resource] < units`
    pub fn release(&mut self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        let (p, r) = self.check_pair(process, resource)?;
        check_units(units)?;

        if self.allocated[p][r] < units {
            return Err(EngineError::InvalidOperation(format!(
                "{process} holds {} of {resource}, cannot release {units}",
                self.allocated[p][r]
            )));
        }

        self.allocated[p][r] -= units;
        self.available[r] += units;

        debug!("ledger: {} released {} x{}", process, resource, units);
        Ok(())
    }

    /// Record (or overwrite) the pending request of `process` for `resource`
    ///
    /// A later request replaces the earlier one; `units == 0` clears it.
    pub fn set_request(&mut self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        let (p, r) = self.check_pair(process, resource)?;
        self.requested[p][r] = units;
        debug!("ledger: {} requests {} x{}", process, resource, units);
        Ok(())
    }

    /// Drop the pending request of `process` for `resource`
    pub fn clear_request(&mut self, process: ProcessId, resource: ResourceId) -> Result<()> {
        self.set_request(process, resource, 0)
    }

    /// Release everything `process` holds and zero its requests
    ///
    /// Returns the number of units released per resource type.
    pub fn force_release_all(&mut self, process: ProcessId) -> Result<Vec<Units>> {
        let p = self.check_process(process)?;

        let released = std::mem::replace(&mut self.allocated[p], vec![0; self.num_resources]);
        for (free, &units) in self.available.iter_mut().zip(&released) {
            *free += units;
        }
        self.requested[p].iter_mut().for_each(|units| *units = 0);

        debug!("ledger: force-released {} ({:?})", process, released);
        Ok(released)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Validation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Verify `available + Σ allocated == total` for every resource type
    pub fn check_conservation(&self) -> Result<()> {
        for r in 0..self.num_resources {
            let allocated: u64 = self.allocated.iter().map(|row| u64::from(row[r])).sum();
            let available = u64::from(self.available[r]);
            let total = u64::from(self.total[r]);

            if available + allocated != total {
                return Err(EngineError::ConservationViolated {
                    resource: ResourceId(r),
                    available,
                    allocated,
                    total,
                });
            }
        }
        Ok(())
    }

    /// Bounds-check a process index
    pub fn check_process(&self, process: ProcessId) -> Result<usize> {
        let p = process.as_usize();
        if p >= self.num_processes {
            return Err(EngineError::InvalidArgument(format!(
                "process {process} out of range (P = {})",
                self.num_processes
            )));
        }
        Ok(p)
    }

    /// Bounds-check a resource index
    pub fn check_resource(&self, resource: ResourceId) -> Result<usize> {
        let r = resource.as_usize();
        if r >= self.num_resources {
            return Err(EngineError::InvalidArgument(format!(
                "resource {resource} out of range (R = {})",
                self.num_resources
            )));
        }
        Ok(r)
    }

    fn check_pair(&self, process: ProcessId, resource: ResourceId) -> Result<(usize, usize)> {
        Ok((self.check_process(process)?, self.check_resource(resource)?))
    }
}

/// Reject a zero unit count
pub(crate) fn check_units(units: Units) -> Result<()> {
    if units == 0 {
        return Err(EngineError::InvalidArgument(
            "unit count must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(EngineError::InvalidArgument(format!(
            "{name} has {actual} entries, expected {expected}"
        )));
    }
    Ok(())
}

fn check_matrix(name: &str, matrix: &[Vec<Units>], rows: usize, cols: usize) -> Result<()> {
    check_len(name, matrix.len(), rows)?;
    for (i, row) in matrix.iter().enumerate() {
        check_len(&format!("{name} row P{i}"), row.len(), cols)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadlocked_pair() -> ResourceLedger {
        ResourceLedger::new(
            2,
            2,
            vec![1, 1],
            vec![0, 0],
            vec![vec![1, 0], vec![0, 1]],
            vec![vec![0, 1], vec![1, 0]],
        )
        .unwrap()
    }

    #[test]
    fn test_grant_moves_units_and_clears_request() {
        let mut ledger = ResourceLedger::empty(2, 1, vec![3]).unwrap();
        ledger.set_request(ProcessId(0), ResourceId(0), 2).unwrap();

        ledger.grant(ProcessId(0), ResourceId(0), 2).unwrap();

        assert_eq!(ledger.available(ResourceId(0)), 1);
        assert_eq!(ledger.allocated(ProcessId(0), ResourceId(0)), 2);
        assert_eq!(ledger.requested(ProcessId(0), ResourceId(0)), 0);
        ledger.check_conservation().unwrap();
    }

    #[test]
    fn test_grant_beyond_available_is_rejected_without_mutation() {
        let mut ledger = ResourceLedger::empty(1, 1, vec![1]).unwrap();
        let before = ledger.clone();

        let result = ledger.grant(ProcessId(0), ResourceId(0), 2);

        assert!(matches!(result, Err(EngineError::InvalidOperation(_))));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_release_more_than_held_is_rejected() {
        let mut ledger = deadlocked_pair();
        let before = ledger.clone();

        let result = ledger.release(ProcessId(0), ResourceId(0), 2);

        assert!(matches!(result, Err(EngineError::InvalidOperation(_))));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_zero_units_is_invalid_argument() {
        let mut ledger = deadlocked_pair();
        assert!(matches!(
            ledger.release(ProcessId(0), ResourceId(0), 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_force_release_all_returns_held_units() {
        let mut ledger = deadlocked_pair();

        let released = ledger.force_release_all(ProcessId(1)).unwrap();

        assert_eq!(released, vec![0, 1]);
        assert_eq!(ledger.available_all(), &[0, 1]);
        assert_eq!(ledger.request_row(ProcessId(1)).unwrap(), &[0, 0]);
        ledger.check_conservation().unwrap();
    }

    #[test]
    fn test_later_request_overwrites() {
        let mut ledger = ResourceLedger::empty(1, 1, vec![5]).unwrap();
        ledger.set_request(ProcessId(0), ResourceId(0), 4).unwrap();
        ledger.set_request(ProcessId(0), ResourceId(0), 1).unwrap();
        assert_eq!(ledger.requested(ProcessId(0), ResourceId(0)), 1);
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        let result = ResourceLedger::new(
            1,
            1,
            vec![2],
            vec![2],
            vec![vec![1]],
            vec![vec![0]],
        );
        assert!(matches!(result, Err(EngineError::ConservationViolated { .. })));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let result = ResourceLedger::new(2, 1, vec![1], vec![1], vec![vec![0]], vec![vec![0], vec![0]]);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_out_of_range_indices() {
        let mut ledger = deadlocked_pair();
        assert!(ledger.grant(ProcessId(5), ResourceId(0), 1).is_err());
        assert!(ledger.set_request(ProcessId(0), ResourceId(9), 1).is_err());
        assert_eq!(ledger.allocated(ProcessId(5), ResourceId(0)), 0);
    }

    #[test]
    fn test_held_by_lists_resources_in_index_order() {
        let ledger = ResourceLedger::new(
            1,
            3,
            vec![1, 1, 1],
            vec![0, 1, 0],
            vec![vec![1, 0, 1]],
            vec![vec![0, 0, 0]],
        )
        .unwrap();
        let held: Vec<_> = ledger.held_by(ProcessId(0)).collect();
        assert_eq!(held, vec![ResourceId(0), ResourceId(2)]);
    }
}
