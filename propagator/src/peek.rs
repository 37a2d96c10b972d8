//! The peek driver (§4.7): for every variable whose fixing was actually read
//! during the base propagation pass ("impactful"), tries forcing it to each
//! value in turn via the virtual-fixings overlay; if one branch is
//! infeasible, commits the opposite value for real.
//!
//! Peek commits are tagged with [`symretope_core::PEEK_INFERINFO`] so the
//! resolver knows to use the replay-and-sparsify path (§4.8) rather than the
//! direct surface-rule path.

use std::collections::BTreeSet;

use symretope_core::{BaseBounds, Permutation, SymretopeError, VirtualFixings};
use tracing::trace;

use crate::orchestrator::{self, OrchestratorOutcome, TrackedPermutation};

/// Runs the orchestrator against `overlay`, falling through to `base` for
/// everything `overlay` hasn't overridden (the real bounds plus any earlier
/// peek commits), and reports whether it proved infeasibility.
fn probe_infeasible(
    perm: &Permutation,
    tracked_powers: u64,
    overlay: &mut VirtualFixings,
    base: &dyn BaseBounds,
) -> Result<bool, SymretopeError> {
    let mut trees: Vec<TrackedPermutation> =
        orchestrator::init_tracked_powers(perm, perm.n(), tracked_powers, false);
    let outcome = orchestrator::run_to_fixpoint(&mut trees, perm, overlay, base, true, |_, _| {})?;
    Ok(matches!(outcome, OrchestratorOutcome::Infeasible { .. }))
}

/// Drives the peek loop until no impactful entry remains unresolved or
/// infeasibility is reached. `impactful` is consumed (peek may discover and
/// add more as committed fixings change completeness).
///
/// Returns the peek-committed `(index, value)` pairs, in commit order, or
/// `Err` carrying nothing extra — infeasibility is reported through the
/// `bool` in the `Ok` tuple instead, since peek infeasibility is itself a
/// valid outcome, not an internal error.
pub fn run_peek(
    perm: &Permutation,
    tracked_powers: u64,
    overlay: &VirtualFixings,
    base: &dyn BaseBounds,
    mut impactful: BTreeSet<usize>,
) -> Result<Vec<(usize, bool)>, SymretopeError> {
    // chains through the propagation pass's overlay down to the host's real
    // bounds, so `committed` below only needs to track peek's own commits.
    struct CombinedBase<'a> {
        overlay: &'a VirtualFixings,
        base: &'a dyn BaseBounds,
    }
    impl<'a> BaseBounds for CombinedBase<'a> {
        fn base_flags(&self, index: usize) -> symretope_core::FixingFlags {
            self.overlay.get(index, self.base, true)
        }
    }
    let combined = CombinedBase { overlay, base };

    let mut committed = Vec::new();
    let mut real = VirtualFixings::new(overlay.len());

    loop {
        let Some(&index) = impactful.iter().find(|&&i| real.get(i, &combined, true).is_unfixed())
        else {
            break;
        };
        impactful.remove(&index);

        let mut try_one = real.clone();
        try_one.set(index, true);
        trace!(index, "peeking forced-1");
        let infeasible_on_1 = probe_infeasible(perm, tracked_powers, &mut try_one, &combined)?;
        if infeasible_on_1 {
            real.set(index, false);
            committed.push((index, false));
            continue;
        }

        let mut try_zero = real.clone();
        try_zero.set(index, false);
        trace!(index, "peeking forced-0");
        let infeasible_on_0 = probe_infeasible(perm, tracked_powers, &mut try_zero, &combined)?;
        if infeasible_on_0 {
            real.set(index, true);
            committed.push((index, true));
        }
    }

    Ok(committed)
}

/// Per §4.6, the monotone-ordered fast path restricts peek to one side of
/// each cycle: the minimal unfixed entry in the first half of the cycle
/// needs only its forced-1 branch tested (forced-0 is symmetric for every
/// other entry). `nvars / 2` is integer floor division, matching the source
/// behavior noted for odd cycle lengths (§9, open question (c)).
pub fn first_half_shortcut_index(cycle_len: usize) -> usize {
    cycle_len / 2
}
