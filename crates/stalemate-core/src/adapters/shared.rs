//! Shared Engine Adapter
//!
//! # Design
//! The domain engine takes `&mut self` for every mutation. Callers that
//! drive one session from several threads wrap it here:
//! - One `parking_lot::Mutex` around the whole engine, so each operation
//!   runs to completion before the next starts
//! - Cloning the handle shares the same session
//! - Detection reads the ledger under the same lock as mutations

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::domain::{
    AllocationEngine, CycleRecord, DetectionMode, LedgerSnapshot, ProcessId, RequestResult,
    ResourceId, Result, Units, Victim,
};

/// Thread-safe handle to one [`AllocationEngine`]
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<AllocationEngine>>,
}

impl SharedEngine {
    /// Take ownership of `engine`
    pub fn new(engine: AllocationEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<T>(&self, f: impl FnOnce(&mut AllocationEngine) -> T) -> T {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// See [`AllocationEngine::request_resource`]
    pub fn request(&self, process: ProcessId, resource: ResourceId, units: Units) -> Result<RequestResult> {
        self.with(|engine| engine.request_resource(process, resource, units))
    }

    /// See [`AllocationEngine::release_resource`]
    pub fn release(&self, process: ProcessId, resource: ResourceId, units: Units) -> Result<()> {
        self.with(|engine| engine.release_resource(process, resource, units))
    }

    /// See [`AllocationEngine::detect_deadlock_in`]
    pub fn detect(&self, mode: DetectionMode) -> Option<CycleRecord> {
        self.inner.lock().detect_deadlock_in(mode)
    }

    /// See [`AllocationEngine::resolve_deadlock`]
    pub fn resolve(&self, record: &CycleRecord) -> Result<Vec<Victim>> {
        self.with(|engine| engine.resolve_deadlock(record))
    }

    /// Detect and resolve under one lock acquisition
    ///
    /// The record cannot go stale between the two steps. Returns an empty
    /// list when there is no deadlock.
    pub fn detect_and_resolve(&self, mode: DetectionMode) -> Result<Vec<Victim>> {
        self.with(|engine| match engine.detect_deadlock_in(mode) {
            Some(record) => {
                info!("shared: resolving {}", record);
                engine.resolve_deadlock(&record)
            }
            None => Ok(Vec::new()),
        })
    }

    /// Copy of the ledger's matrices
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }
}

impl From<AllocationEngine> for SharedEngine {
    fn from(engine: AllocationEngine) -> Self {
        Self::new(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineBuilder;
    use std::thread;

    #[test]
    fn test_concurrent_requests_conserve_units() {
        let shared = SharedEngine::new(EngineBuilder::new(4, 1).totals(vec![10]).build().unwrap());

        let handles: Vec<_> = (0..4)
            .map(|p| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        let _ = shared.request(ProcessId(p), ResourceId(0), 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = shared.snapshot();
        let allocated: u32 = snapshot.allocated.iter().map(|row| row[0]).sum();
        assert_eq!(allocated, 10);
        assert_eq!(snapshot.available, vec![0]);
        shared.with(|engine| assert!(engine.ledger().check_conservation().is_ok()));
    }

    #[test]
    fn test_detect_and_resolve_clears_deadlock() {
        let shared: SharedEngine = EngineBuilder::new(2, 2)
            .totals(vec![1, 1])
            .allocation(vec![vec![1, 0], vec![0, 1]])
            .requests(vec![vec![0, 1], vec![1, 0]])
            .build()
            .unwrap()
            .into();

        let victims = shared.detect_and_resolve(DetectionMode::AllocationGraph).unwrap();

        assert_eq!(victims.len(), 2);
        assert!(shared.detect(DetectionMode::AllocationGraph).is_none());
        assert!(shared.detect_and_resolve(DetectionMode::AllocationGraph).unwrap().is_empty());
    }
}
