//! Integration Test: Engine Lifecycle
//!
//! Drives a session the way an interactive caller would: requests build up a
//! deadlock one step at a time, detection reports it, resolution breaks it,
//! and the survivors carry on.

use stalemate_core::domain::{
    DetectionMode, EdgeInput, EngineBuilder, EngineError, EdgeKind, ProcessId, ProcessState,
    RequestResult, ResourceId,
};

#[test]
fn test_dining_philosophers_deadlock_and_recovery() {
    // Three philosophers, three forks, each takes the left fork first
    let mut engine = EngineBuilder::new(4, 3).totals(vec![1, 1, 1]).build().unwrap();

    for p in 0..3 {
        let left = ResourceId(p);
        assert!(engine.request_resource(ProcessId(p), left, 1).unwrap().is_granted());
    }
    assert!(engine.detect_deadlock().is_none());

    for p in 0..3 {
        let right = ResourceId((p + 1) % 3);
        let result = engine.request_resource(ProcessId(p), right, 1).unwrap();
        assert!(matches!(result, RequestResult::Denied { available: 0, .. }));
    }

    let record = engine.detect_deadlock().expect("circular wait");
    assert_eq!(record.processes(), vec![ProcessId(0), ProcessId(1), ProcessId(2)]);
    assert_eq!(record.resources().len(), 3);

    // A bystander queued behind fork 0 is not on the cycle
    engine.request_resource(ProcessId(3), ResourceId(0), 1).unwrap();
    let record = engine.detect_deadlock().unwrap();
    let victims = engine.resolve_deadlock(&record).unwrap();

    assert_eq!(victims.len(), 3);
    assert_eq!(engine.state(ProcessId(3)).unwrap(), ProcessState::Denied);
    assert_eq!(engine.ledger().available_all(), &[1, 1, 1]);

    // The bystander retries and proceeds
    assert!(engine.request_resource(ProcessId(3), ResourceId(0), 1).unwrap().is_granted());
    assert!(engine.detect_deadlock().is_none());
    assert!(engine.ledger().check_conservation().is_ok());
}

#[test]
fn test_prevention_blocks_the_closing_request() {
    let mut engine = EngineBuilder::new(2, 2).totals(vec![1, 1]).prevention(true).build().unwrap();

    engine.request_resource(ProcessId(0), ResourceId(0), 1).unwrap();
    engine.request_resource(ProcessId(1), ResourceId(1), 1).unwrap();
    engine.request_resource(ProcessId(0), ResourceId(1), 1).unwrap();

    // P1 holds R1 and asks for R0, which is ranked lower
    let err = engine.request_resource(ProcessId(1), ResourceId(0), 1).unwrap_err();
    assert!(err.is_order_violation());
    assert!(engine.detect_deadlock().is_none());
}

#[test]
fn test_release_unblocks_waiter() {
    let mut engine = EngineBuilder::new(2, 1).totals(vec![2]).build().unwrap();

    engine.request_resource(ProcessId(0), ResourceId(0), 2).unwrap();
    let denied = engine.request_resource(ProcessId(1), ResourceId(0), 1).unwrap();
    assert_eq!(
        denied.denial(),
        Some(EngineError::InsufficientResources {
            resource: ResourceId(0),
            requested: 1,
            available: 0,
        })
    );

    engine.release_resource(ProcessId(0), ResourceId(0), 1).unwrap();
    let granted = engine.request_resource(ProcessId(1), ResourceId(0), 1).unwrap();

    assert!(granted.is_granted());
    assert_eq!(engine.ledger().requested(ProcessId(1), ResourceId(0)), 0);
    assert_eq!(engine.ledger().available_all(), &[0]);
}

#[test]
fn test_over_release_is_rejected_without_mutation() {
    let mut engine = EngineBuilder::new(1, 1).totals(vec![2]).build().unwrap();
    engine.request_resource(ProcessId(0), ResourceId(0), 1).unwrap();
    let before = engine.snapshot();

    assert!(engine.release_resource(ProcessId(0), ResourceId(0), 2).is_err());
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn test_graph_tracks_every_mutation() {
    let mut engine = EngineBuilder::new(2, 1).totals(vec![1]).build().unwrap();

    engine.request_resource(ProcessId(0), ResourceId(0), 1).unwrap();
    engine.request_resource(ProcessId(1), ResourceId(0), 1).unwrap();

    // Nodes: P0 = 0, P1 = 1, R0 = 2
    assert!(engine.graph().has_edge(2, 0));
    assert!(engine.graph().has_edge(1, 2));

    let kinds: Vec<_> = engine.graph_edges().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EdgeKind::Holds, EdgeKind::WaitsFor]);

    engine.kill(ProcessId(0)).unwrap();
    assert!(!engine.graph().has_edge(2, 0));
    assert_eq!(engine.graph().edge_count(), 1);
}

#[test]
fn test_wait_for_prevention_rejects_backward_edges() {
    let mut engine = EngineBuilder::new(3, 1).totals(vec![1]).build().unwrap();

    assert_eq!(
        engine.input_wait_for_edge(ProcessId(0), ProcessId(2), true).unwrap(),
        EdgeInput::Added
    );
    assert_eq!(
        engine.input_wait_for_edge(ProcessId(2), ProcessId(0), true).unwrap(),
        EdgeInput::RejectedByOrderRule
    );
    assert_eq!(
        engine.input_wait_for_edge(ProcessId(1), ProcessId(1), true).unwrap(),
        EdgeInput::RejectedByOrderRule
    );
    assert!(engine.detect_deadlock_in(DetectionMode::WaitForGraph).is_none());

    // Without the rule the same edge closes a cycle
    engine.input_wait_for_edge(ProcessId(2), ProcessId(0), false).unwrap();
    assert!(engine.detect_deadlock_in(DetectionMode::WaitForGraph).is_some());
}

#[test]
fn test_detection_is_read_only() {
    let engine = EngineBuilder::new(2, 2)
        .totals(vec![1, 1])
        .allocation(vec![vec![1, 0], vec![0, 1]])
        .requests(vec![vec![0, 1], vec![1, 0]])
        .build()
        .unwrap();
    let before = engine.snapshot();

    let first = engine.detect_deadlock();
    let second = engine.detect_deadlock();

    assert_eq!(first, second);
    assert_eq!(engine.snapshot(), before);
}
