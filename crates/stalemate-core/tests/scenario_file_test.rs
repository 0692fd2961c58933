//! Integration Test: Scenario Files
//!
//! Scenario documents written to disk, loaded back and turned into engines.

use std::io::Write;

use stalemate_core::{DetectionMode, ProcessId, Scenario, ScenarioError};
use tempfile::NamedTempFile;

fn write_scenario(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_and_resolve_from_file() {
    let file = write_scenario(
        r#"{
            "processes": 3,
            "resources": 2,
            "totals": [1, 1],
            "allocation": [[1, 0], [0, 1], [0, 0]],
            "requests": [[0, 1], [1, 0], [1, 0]]
        }"#,
    );

    let mut engine = Scenario::load(file.path()).unwrap().into_engine().unwrap();
    let record = engine.detect_deadlock().unwrap();
    let victims = engine.resolve_deadlock(&record).unwrap();

    assert_eq!(victims.iter().map(|v| v.process).collect::<Vec<_>>(), vec![ProcessId(0), ProcessId(1)]);
    assert!(engine.terminated().iter().all(|p| *p != ProcessId(2)));
    assert_eq!(engine.ledger().available_all(), &[1, 1]);
}

#[test]
fn test_wait_for_scenario_from_file() {
    let file = write_scenario(
        r#"{
            "processes": 3,
            "resources": 0,
            "wait_for": [[0, 1], [1, 2], [2, 0]]
        }"#,
    );

    let engine = Scenario::load(file.path()).unwrap().into_engine().unwrap();
    let record = engine.detect_deadlock_in(DetectionMode::WaitForGraph).unwrap();

    assert_eq!(record.len(), 3);
}

#[test]
fn test_scenario_round_trips_through_json() {
    let scenario = Scenario::from_json_str(
        r#"{ "processes": 1, "resources": 2, "totals": [2, 1], "prevention": true, "resource_order": [1, 0] }"#,
    )
    .unwrap();

    let json = serde_json::to_string(&scenario).unwrap();
    let file = write_scenario(&json);

    assert_eq!(Scenario::load(file.path()).unwrap(), scenario);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");

    let err = Scenario::load(&missing).unwrap_err();

    assert!(matches!(err, ScenarioError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}
