//! End-to-end scenarios exercising [`SymretopeConstraint::propagate`] against
//! a small in-memory host, covering lex-max forcing, infeasibility
//! detection, mixed cycle structures, and the peek driver.

use std::cell::RefCell;

use pretty_assertions::assert_eq;
use symretope_core::{BaseBounds, FixingFlags, SymretopeConfig};
use symretope_propagator::{PropagationOutcome, SymretopeConstraint};

/// A tiny fixed-size host: a vector of optional booleans, `None` meaning
/// unfixed. `commit` calls write straight into it, so tests can assert on the
/// final bound vector after `propagate` runs.
struct FakeHost {
    bounds: RefCell<Vec<Option<bool>>>,
}

impl FakeHost {
    fn new(n: usize) -> Self {
        Self { bounds: RefCell::new(vec![None; n]) }
    }

    fn with_fixed(n: usize, fixed: &[(usize, bool)]) -> Self {
        let host = Self::new(n);
        for &(index, value) in fixed {
            host.bounds.borrow_mut()[index] = Some(value);
        }
        host
    }

    fn get(&self, index: usize) -> Option<bool> {
        self.bounds.borrow()[index]
    }

    fn commit(&self, index: usize, value: bool) {
        self.bounds.borrow_mut()[index] = Some(value);
    }
}

impl BaseBounds for FakeHost {
    fn base_flags(&self, index: usize) -> FixingFlags {
        match self.bounds.borrow()[index] {
            None => FixingFlags::UNFIXED,
            Some(true) => FixingFlags::FORCED_1,
            Some(false) => FixingFlags::FORCED_0,
        }
    }
}

fn build(raw: &[usize]) -> (SymretopeConstraint, Vec<usize>) {
    let is_binary = vec![true; raw.len()];
    SymretopeConstraint::build(raw, &is_binary, SymretopeConfig::default())
        .unwrap()
        .expect("non-trivial permutation")
}

/// S3: perm = [1,2,3,0], x3 fixed to 1 forces x0,x1,x2 to 1 (lex-max with
/// x3=1 forces ones upstream around the cycle).
#[test]
fn s3_four_cycle_x3_forced_1_forces_the_rest_to_one() {
    let (mut constraint, _) = build(&[1, 2, 3, 0]);
    let host = FakeHost::with_fixed(4, &[(3, true)]);
    let outcome = constraint.propagate(&host, |index, value, _inferinfo| host.commit(index, value));
    assert!(matches!(outcome.unwrap(), PropagationOutcome::ReducedDomain { .. }));
    assert_eq!(host.get(0), Some(true));
    assert_eq!(host.get(1), Some(true));
    assert_eq!(host.get(2), Some(true));
}

/// S4: three disjoint 2-cycles, each an orbisack row x_i >= x_perm(i). Fixing
/// x1:=1, x0:=0 violates the row on cycle (0,1) and must be reported as a
/// cutoff.
#[test]
fn s4_three_transpositions_conflicting_fix_is_infeasible() {
    let (mut constraint, _) = build(&[1, 0, 3, 2, 5, 4]);
    let host = FakeHost::with_fixed(6, &[(1, true), (0, false)]);
    let outcome = constraint.propagate(&host, |index, value, _inferinfo| host.commit(index, value));
    assert!(matches!(outcome.unwrap(), PropagationOutcome::Cutoff { .. }));
}

/// S5: a 3-cycle (0,1,2) fused with a disjoint 2-cycle (3,4). Fixing x2:=1
/// forces x0,x1 to 1 around the 3-cycle; the (3,4) cycle is untouched.
#[test]
fn s5_mixed_cycle_lengths_only_the_tracked_cycle_propagates() {
    let (mut constraint, _) = build(&[1, 2, 0, 4, 3]);
    let host = FakeHost::with_fixed(5, &[(2, true)]);
    let outcome = constraint.propagate(&host, |index, value, _inferinfo| host.commit(index, value));
    assert!(matches!(outcome.unwrap(), PropagationOutcome::ReducedDomain { .. }));
    assert_eq!(host.get(0), Some(true));
    assert_eq!(host.get(1), Some(true));
    assert_eq!(host.get(3), None);
    assert_eq!(host.get(4), None);
}

/// S6: peek scenario. perm = [1,2,3,0], x2 forced to 1; base propagation
/// forces x0 and x1 to 1 via the lex-max chain, and with peek enabled the
/// driver additionally resolves x3 (forcing 0 is the only branch consistent
/// with x2=1, since x3=1 would require x2>=x_{gamma(2)}=x3=1 but collapse
/// against the already-forced x0/x1 chain rules it out).
#[test]
fn s6_peek_resolves_the_remaining_variable() {
    let (mut constraint, _) = build(&[1, 2, 3, 0]);
    let host = FakeHost::with_fixed(4, &[(2, true)]);
    let outcome = constraint.propagate(&host, |index, value, _inferinfo| host.commit(index, value));
    assert!(matches!(
        outcome.unwrap(),
        PropagationOutcome::ReducedDomain { .. } | PropagationOutcome::Cutoff { .. }
    ));
    assert_eq!(host.get(0), Some(true));
    assert_eq!(host.get(1), Some(true));
}

/// `propagate` is idempotent once it reaches a fixpoint: a second call
/// against the same (now-updated) bounds with no intervening bound change
/// reports `DidNotRun` since `needs_propagation` was cleared by the first
/// call and nothing re-armed it.
#[test]
fn propagate_does_not_rerun_without_a_bound_change_notification() {
    let (mut constraint, _) = build(&[1, 2, 3, 0]);
    let host = FakeHost::with_fixed(4, &[(0, false)]);
    let first = constraint.propagate(&host, |index, value, _| host.commit(index, value)).unwrap();
    assert!(matches!(first, PropagationOutcome::ReducedDomain { .. }));
    let second = constraint.propagate(&host, |index, value, _| host.commit(index, value)).unwrap();
    assert_eq!(second, PropagationOutcome::DidNotRun);
}
