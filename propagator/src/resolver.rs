//! Conflict resolution (§4.8): given a previously-inferred fixing, replay
//! enough of the propagation logic under *historical* bounds to report a
//! minimal set of antecedent bound changes.

use std::collections::BTreeSet;

use symretope_core::{BaseBounds, FixingFlags, Permutation, VirtualFixings};
use tracing::trace;

use crate::orchestrator::{self, OrchestratorOutcome, TrackedPermutation};

/// A read-only view of the host's bound history, indexed by `bdchgidx`
/// (§6). Supplements the distilled spec's `resolve-propagation` entry point
/// so the resolver is host-agnostic and unit-testable without a real
/// solver.
pub trait HistoricalBounds {
    fn lb_at(&self, index: usize, bdchgidx: usize) -> bool;
    fn ub_at(&self, index: usize, bdchgidx: usize) -> bool;
}

/// Wraps a [`HistoricalBounds`] + fixed `bdchgidx` as a [`BaseBounds`], so
/// the rest of the engine's machinery (which only knows about "the current
/// bounds") can be reused unmodified for replay.
struct HistoricalAsBase<'a> {
    bounds: &'a dyn HistoricalBounds,
    bdchgidx: usize,
}

impl<'a> BaseBounds for HistoricalAsBase<'a> {
    fn base_flags(&self, index: usize) -> FixingFlags {
        let lb = self.bounds.lb_at(index, self.bdchgidx);
        let ub = self.bounds.ub_at(index, self.bdchgidx);
        FixingFlags::from_bounds(lb, ub)
    }
}

/// A single antecedent bound the resolver reports to the solver's
/// conflict-analysis sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antecedent {
    LowerBound { index: usize },
    UpperBound { index: usize },
}

/// Resolves a direct surface-rule fixing (`inferinfo = p >= 0`): §4.8's
/// "seed the converse at x_k, mirror the 3x3 table under historical bounds,
/// the first (0,1) row proves infeasibility; every bound read along the way
/// becomes an antecedent."
pub fn resolve_direct(
    perm: &Permutation,
    power: i64,
    inferred_index: usize,
    inferred_value: bool,
    bounds: &dyn HistoricalBounds,
    bdchgidx: usize,
) -> Vec<Antecedent> {
    let base = HistoricalAsBase { bounds, bdchgidx };
    let n = perm.n();
    let mut overlay = VirtualFixings::new(n);
    // seed the converse of the inferred fixing.
    overlay.set(inferred_index, !inferred_value);
    let mut antecedents = Vec::new();
    let mut seen = BTreeSet::new();

    for i in 0..n {
        let j = perm.inverse_apply(i, power);
        if i == j {
            continue;
        }
        let xi = overlay.get(i, &base, true);
        let xj = overlay.get(j, &base, true);
        for (idx, flags) in [(i, xi), (j, xj)] {
            // the hypothesis being tested is not an antecedent of itself —
            // S must range over bounds on other variables (§8 invariant 5).
            if idx != inferred_index && seen.insert(idx) {
                if flags.is_forced_1() {
                    trace!(idx, "resolver records lower-bound antecedent");
                    antecedents.push(Antecedent::LowerBound { index: idx });
                } else if flags.is_forced_0() {
                    trace!(idx, "resolver records upper-bound antecedent");
                    antecedents.push(Antecedent::UpperBound { index: idx });
                }
            }
        }
        if xi.is_forced_0() && xj.is_forced_1() {
            // (0,1): infeasibility proven, the antecedents recorded so far
            // suffice.
            break;
        }
    }
    antecedents
}

/// Resolves a peek-driven fixing (`inferinfo = -1`): replay the base
/// orchestrator under an overlay seeded with the converse of the peek
/// decision plus every locally-fixed variable at `bdchgidx`, record every
/// variable read, then sparsify by dropping one recorded variable at a time
/// and re-running, keeping it only if removing it restores feasibility.
pub fn resolve_peek(
    perm: &Permutation,
    tracked_powers: u64,
    inferred_index: usize,
    inferred_value: bool,
    bounds: &dyn HistoricalBounds,
    bdchgidx: usize,
) -> Vec<Antecedent> {
    let base = HistoricalAsBase { bounds, bdchgidx };
    let n = perm.n();

    let replay = |fixed: &BTreeSet<usize>| -> bool {
        let mut overlay = VirtualFixings::new(n);
        overlay.set(inferred_index, !inferred_value);
        for &idx in fixed {
            if idx == inferred_index {
                continue;
            }
            let flags = base.base_flags(idx);
            if let Some(value) = flags.as_value() {
                if value.is_forced() {
                    overlay.set(idx, matches!(value, symretope_core::Value::One));
                }
            }
        }
        let mut trees: Vec<TrackedPermutation> =
            orchestrator::init_tracked_powers(perm, n, tracked_powers, false);
        matches!(
            orchestrator::run_to_fixpoint(&mut trees, perm, &mut overlay, &base, true, |_, _| {}),
            Ok(OrchestratorOutcome::Infeasible { .. })
        )
    };

    let all_fixed: BTreeSet<usize> = (0..n)
        .filter(|&i| i != inferred_index)
        .filter(|&i| base.base_flags(i).as_value().map(|v| v.is_forced()).unwrap_or(false))
        .collect();

    if !replay(&all_fixed) {
        // the full antecedent set doesn't even reproduce infeasibility;
        // nothing to report (should not happen for a genuine peek fixing).
        return Vec::new();
    }

    let mut kept = all_fixed.clone();
    for &candidate in &all_fixed {
        let mut without = kept.clone();
        without.remove(&candidate);
        if replay(&without) {
            kept = without;
        }
    }

    kept.into_iter()
        .map(|idx| {
            let flags = base.base_flags(idx);
            if flags.is_forced_1() {
                Antecedent::LowerBound { index: idx }
            } else {
                Antecedent::UpperBound { index: idx }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAt {
        values: Vec<Option<bool>>,
    }
    impl HistoricalBounds for FixedAt {
        fn lb_at(&self, index: usize, _bdchgidx: usize) -> bool {
            matches!(self.values[index], Some(true))
        }
        fn ub_at(&self, index: usize, _bdchgidx: usize) -> bool {
            !matches!(self.values[index], Some(false))
        }
    }

    #[test]
    fn resolve_direct_on_four_cycle_records_the_forcing_chain() {
        // perm = [1,2,3,0], power 1, x0 forced to 0 historically; the
        // inferred fixing under test is x3 := 0 (surfaced by (x0,x3)=(0,*)).
        let perm = Permutation::build(&[1, 2, 3, 0]).unwrap();
        let bounds = FixedAt { values: vec![Some(false), None, None, None] };
        let antecedents = resolve_direct(&perm, 1, 3, false, &bounds, 0);
        assert!(antecedents.contains(&Antecedent::UpperBound { index: 0 }));
    }
}
