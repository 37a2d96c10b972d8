//! The general propagation orchestrator (§4.5): drives every tracked
//! permutation power's [`PermutationState`] to a fixpoint, alternating
//! between advancing builder cursors and draining the fixing queue.

use std::collections::{BTreeSet, VecDeque};

use symretope_core::{BaseBounds, FixingQueue, Permutation, SymretopeError, VirtualFixings};
use tracing::{debug, trace, warn};

use crate::builder::{self, BuilderOutcome, PermutationState};

/// One tracked power `γ^power`, paired with its tree-builder state.
pub struct TrackedPermutation {
    pub state: PermutationState,
}

/// Builds the list of tracked powers for `perm`, honoring the `maxOrder` /
/// `maxOrderTimesN` caps (§7 "Group too large"). Returns the list alongside
/// whether the group was truncated.
pub fn init_tracked_powers(
    perm: &Permutation,
    n: usize,
    tracked_powers: u64,
    truncated: bool,
) -> Vec<TrackedPermutation> {
    if truncated {
        warn!(order = perm.order(), tracked_powers, "symretope group truncated to configured cap");
    }
    (1..=tracked_powers as i64)
        .map(|power| TrackedPermutation { state: PermutationState::new(n, power) })
        .collect()
}

/// The result of running the orchestrator to a fixpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorOutcome {
    Infeasible { power: i64 },
    Complete { new_fixings: usize },
}

/// Applies one `(index, value)` fixing: writes it to the overlay (peek mode)
/// or leaves it for the caller to commit to the host (real mode), then
/// reacts across every tracked tree and possibly re-queues permutations.
fn apply_fixing(
    trees: &mut [TrackedPermutation],
    index: usize,
    value: bool,
    perm_queue: &mut VecDeque<usize>,
    queue: &mut FixingQueue,
) -> Result<Option<i64>, SymretopeError> {
    let mut infeasible_power = None;
    for (id, tp) in trees.iter_mut().enumerate() {
        if builder::react_to_fixing(&mut tp.state, index, value, queue)? {
            infeasible_power.get_or_insert(tp.state.power);
        }
        if !perm_queue.contains(&id) {
            perm_queue.push_back(id);
        }
    }
    Ok(infeasible_power)
}

/// Runs the general orchestrator (§4.5) to a fixpoint against `overlay`
/// (falling through to `base` when `use_base_bounds`), committing every
/// surfaced fixing through `commit`.
///
/// `commit` returns `true` if the fixing was accepted (it always is for
/// real-bounds mode; peek mode never calls this with `use_base_bounds =
/// false` since the overlay already holds the hypothesis).
pub fn run_to_fixpoint(
    trees: &mut [TrackedPermutation],
    perm: &Permutation,
    overlay: &mut VirtualFixings,
    base: &dyn BaseBounds,
    use_base_bounds: bool,
    mut commit: impl FnMut(usize, bool),
) -> Result<OrchestratorOutcome, SymretopeError> {
    let mut queue = FixingQueue::new(perm.n());
    let mut perm_queue: VecDeque<usize> = (0..trees.len()).collect();
    let mut impactful = BTreeSet::new();
    let mut new_fixings = 0usize;

    loop {
        while let Some(id) = perm_queue.pop_front() {
            let tp = &mut trees[id];
            trace!(power = tp.state.power, cursor = tp.state.cursor, "advancing builder");
            loop {
                let outcome = builder::advance(
                    &mut tp.state,
                    perm,
                    overlay,
                    base,
                    use_base_bounds,
                    &mut queue,
                    &mut impactful,
                )?;
                match outcome {
                    BuilderOutcome::Stalled | BuilderOutcome::Exhausted => break,
                    BuilderOutcome::Infeasible => {
                        debug!(power = tp.state.power, "power proved infeasibility");
                        return Ok(OrchestratorOutcome::Infeasible { power: tp.state.power });
                    }
                }
            }
        }

        if queue.is_empty() {
            break;
        }
        while let Some((index, value, _power)) = queue.drain_one() {
            let already = overlay.get(index, base, use_base_bounds);
            if already != resolved_flags(value) {
                overlay.set(index, value);
                commit(index, value);
                new_fixings += 1;
                debug!(index, value, "fixing surfaced");
            }
            if let Some(power) = apply_fixing(trees, index, value, &mut perm_queue, &mut queue)? {
                return Ok(OrchestratorOutcome::Infeasible { power });
            }
        }
    }

    Ok(OrchestratorOutcome::Complete { new_fixings })
}

fn resolved_flags(value: bool) -> symretope_core::FixingFlags {
    if value {
        symretope_core::FixingFlags::FORCED_1
    } else {
        symretope_core::FixingFlags::FORCED_0
    }
}
