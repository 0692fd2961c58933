//! Kani Formal Verification Proofs

#![cfg(kani)]

use super::engine::*;
use super::ledger::*;
use super::types::*;

/// Verify conservation survives an arbitrary grant / release / kill sequence
///
/// # Scenario
///
/// ```text
/// State 1: 2 processes, 2 resource types, symbolic totals
/// State 2: symbolic grant
/// State 3: symbolic release
/// State 4: kill P0
/// ```
#[kani::proof]
#[kani::unwind(4)]
fn proof_verify_conservation() {
    let t0: u8 = kani::any();
    let t1: u8 = kani::any();
    let mut ledger = ResourceLedger::empty(2, 2, vec![u32::from(t0), u32::from(t1)]).unwrap();

    let p = ProcessId(usize::from(kani::any::<bool>()));
    let r = ResourceId(usize::from(kani::any::<bool>()));
    let grant: u8 = kani::any();
    let release: u8 = kani::any();

    let _ = ledger.grant(p, r, u32::from(grant));
    kani::assert(ledger.check_conservation().is_ok(), "grant conserves");

    let _ = ledger.release(p, r, u32::from(release));
    kani::assert(ledger.check_conservation().is_ok(), "release conserves");

    let _ = ledger.force_release_all(ProcessId(0));
    kani::assert(ledger.check_conservation().is_ok(), "kill conserves");
}

/// Verify a failed grant leaves the ledger untouched
#[kani::proof]
#[kani::unwind(4)]
fn proof_verify_failed_grant_is_atomic() {
    let mut ledger = ResourceLedger::empty(1, 1, vec![1]).unwrap();
    let before = ledger.clone();

    let units: u8 = kani::any();
    kani::assume(units > 1);

    let result = ledger.grant(ProcessId(0), ResourceId(0), u32::from(units));
    kani::assert(result.is_err(), "over-grant must fail");
    kani::assert(ledger == before, "no partial mutation");
}

/// Verify the AB-BA allocation deadlock is found and fully resolved
#[kani::proof]
#[kani::unwind(6)]
fn proof_verify_ab_ba_resolution() {
    let mut engine = AllocationEngine::initialize(
        2,
        2,
        vec![1, 1],
        vec![0, 0],
        vec![vec![1, 0], vec![0, 1]],
        vec![vec![0, 1], vec![1, 0]],
    )
    .unwrap();

    let record = engine.detect_deadlock();
    kani::assert(record.is_some(), "AB-BA cycle must be detected");

    if let Some(record) = record {
        let victims = engine.resolve_deadlock(&record);
        kani::assert(victims.is_ok(), "fresh record resolves");
        kani::assert(engine.detect_deadlock().is_none(), "cycle is broken");
    }
}
