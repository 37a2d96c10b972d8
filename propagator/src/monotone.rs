//! The monotone-ordered fast path (§4.6): when a permutation is both
//! monotone and ordered, propagation decomposes cycle by cycle instead of
//! power by power, maintaining an "equality power" `μ` that tracks how much
//! of the group is already known to act as the identity on the fixed
//! prefix.

use std::collections::BTreeSet;

use symretope_core::{BaseBounds, Permutation, SymretopeError, VirtualFixings};
use tracing::debug;

use crate::orchestrator::{self, OrchestratorOutcome, TrackedPermutation};

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b)).saturating_mul(b)
}

/// Runs the fast path for a permutation already confirmed `monotone() &&
/// ordered()`. `commit` is called for every fixing the cycle-local
/// orchestrators surface, in the real host's variable numbering (`perm`'s
/// compacted index space). Every variable read by a cycle's local tree
/// builders is recorded into `impactful` (in global numbering), the same
/// conservative "whatever the builder touched" superset the general
/// orchestrator path hands the peek driver — §4.6's own peek pass runs
/// per cycle, so each cycle contributes its own slice of the candidate set.
pub fn run_monotone_ordered(
    perm: &Permutation,
    overlay: &mut VirtualFixings,
    base: &dyn BaseBounds,
    impactful: &mut BTreeSet<usize>,
    mut commit: impl FnMut(usize, bool),
) -> Result<OrchestratorOutcome, SymretopeError> {
    debug_assert!(perm.monotone() && perm.ordered());
    let order = perm.order();
    let mut mu: u64 = 1;
    let mut total_new = 0usize;

    for (cycle_id, cycle) in perm.cycles().iter().enumerate() {
        let len = perm.cycle_len(cycle_id) as u64;
        if len == 0 {
            continue;
        }
        if mu % len == 0 {
            continue;
        }

        let non_identity_powers = len / gcd(len, mu) - 1;
        debug!(cycle_id, mu, non_identity_powers, "processing cycle in fast path");

        // Build a single-cycle sub-permutation restricted to this cycle's
        // support, with generator power `mu`, and drive the general
        // orchestrator on it alone.
        let (sub_perm, local_of) = cycle_sub_permutation(cycle, mu);
        let mut local_overlay = VirtualFixings::new(sub_perm.n());
        // Snapshot the cycle's current global fixings into a read-only base
        // so the inner orchestrator run doesn't need a live borrow of the
        // outer overlay (which the commit closure below also needs to
        // mutate).
        struct Snapshot(Vec<symretope_core::FixingFlags>);
        impl BaseBounds for Snapshot {
            fn base_flags(&self, local_index: usize) -> symretope_core::FixingFlags {
                self.0[local_index]
            }
        }
        let snapshot = Snapshot(cycle.iter().map(|&v| overlay.get(v, base, true)).collect());

        let mut trees: Vec<TrackedPermutation> =
            orchestrator::init_tracked_powers(&sub_perm, sub_perm.n(), non_identity_powers, false);

        let mut pending: Vec<(usize, bool)> = Vec::new();
        let outcome = orchestrator::run_to_fixpoint(
            &mut trees,
            &sub_perm,
            &mut local_overlay,
            &snapshot,
            true,
            |local_index, value| pending.push((local_index, value)),
        )?;

        for (local_index, value) in pending {
            let global = local_of[local_index];
            overlay.set(global, value);
            commit(global, value);
            total_new += 1;
        }

        for tp in &trees {
            record_cycle_impactful(impactful, tp, &local_of);
        }

        if let OrchestratorOutcome::Infeasible { power } = outcome {
            return Ok(OrchestratorOutcome::Infeasible { power });
        }

        // update mu per §4.6: if any index in the cycle is still unfixed,
        // mu := lcm(mu, len); otherwise find the smallest rotation k that
        // reproduces the fixed pattern and mu := lcm(mu, k).
        let any_unfixed = cycle.iter().any(|&v| overlay.get(v, base, true).is_unfixed());
        if any_unfixed {
            mu = lcm(mu, len);
        } else {
            let k = smallest_repeating_rotation(cycle, overlay, base);
            mu = lcm(mu, k as u64);
        }

        if mu == order {
            break;
        }
    }

    Ok(OrchestratorOutcome::Complete { new_fixings: total_new })
}

/// Maps a cycle-local tree builder's allocated nodes back to global variable
/// numbering and records them into `impactful`, mirroring
/// `constraint::record_impactful`'s conservative superset for the general
/// path.
fn record_cycle_impactful(impactful: &mut BTreeSet<usize>, tp: &TrackedPermutation, local_of: &[usize]) {
    for id in 0..tp.state.tree.capacity() {
        if tp.state.tree.is_allocated(id) {
            let local_var = symretope_core::tree::variable_of(id);
            impactful.insert(local_of[local_var]);
        }
    }
}

/// Builds the single-cycle permutation that acts as `γ^mu` restricted to
/// `cycle`'s support, remapped to a dense local index space. Returns the
/// sub-permutation and the local->global index map.
fn cycle_sub_permutation(cycle: &[usize], mu: u64) -> (Permutation, Vec<usize>) {
    let len = cycle.len();
    let shift = (mu % len as u64) as usize;
    let map: Vec<usize> = (0..len).map(|pos| (pos + shift) % len).collect();
    let perm = Permutation::build(&map).expect("cycle-local rotation is always a valid permutation");
    (perm, cycle.to_vec())
}

/// Smallest `k in [1, len)` such that rotating the cycle's fixed-value
/// pattern by `k` positions reproduces the same pattern; falls back to
/// `len` if no such rotation exists (the only common case when `len` is
/// prime and the pattern is not all-equal).
fn smallest_repeating_rotation(
    cycle: &[usize],
    overlay: &VirtualFixings,
    base: &dyn BaseBounds,
) -> usize {
    let len = cycle.len();
    let values: Vec<bool> = cycle
        .iter()
        .map(|&v| overlay.get(v, base, true).is_forced_1())
        .collect();
    for k in 1..len {
        if (0..len).all(|pos| values[pos] == values[(pos + k) % len]) {
            return k;
        }
    }
    len
}
