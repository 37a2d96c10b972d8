//! The constraint-level entry point: owns one permutation's tracked powers,
//! overlay, and configuration, and implements `propagate` (§4.5/§4.6),
//! `check` (§4.9), and the peek driver (§4.7) as a single cohesive call.
//!
//! This is the type the host adapter (§6) actually holds one of per
//! symretope constraint in the model.

use std::collections::BTreeSet;

use symretope_core::{
    compact_support, BaseBounds, Permutation, SymretopeBuildError, SymretopeConfig, SymretopeError,
    VirtualFixings, PEEK_INFERINFO,
};
use tracing::{info, warn};

use crate::check::{self, CheckResult};
use crate::errors::PropagationOutcome;
use crate::monotone;
use crate::orchestrator::{self, OrchestratorOutcome, TrackedPermutation};
use crate::peek;

/// A single symretope constraint: one permutation, its configuration, and
/// the scratch state a `propagate` call allocates and resets.
pub struct SymretopeConstraint {
    perm: Permutation,
    config: SymretopeConfig,
    tracked_powers: u64,
    truncated: bool,
    /// Set by the host's `on_variable_bound_changed` callback; cleared at
    /// the start of every `propagate` call (§9 "Dynamic dispatch to host").
    needs_propagation: bool,
}

impl SymretopeConstraint {
    /// Builds a constraint from the raw (possibly not-yet-compacted)
    /// construction input (§6 "Constraint construction input"): a raw
    /// permutation map over `n'` host variables and which of them are
    /// binary. Non-binary and fixed-point indices are compacted out before
    /// [`Permutation::build`] runs.
    ///
    /// Returns `None` if compaction leaves zero variables — per §6, `n = 0`
    /// means the constraint is trivially satisfied and elided.
    pub fn build(
        raw_perm: &[usize],
        is_binary: &[bool],
        config: SymretopeConfig,
    ) -> Result<Option<(Self, Vec<usize>)>, SymretopeBuildError> {
        let (compacted_map, original_of) = compact_support(raw_perm, is_binary);
        if compacted_map.is_empty() {
            return Ok(None);
        }
        let perm = Permutation::build(&compacted_map)?;
        let (tracked_powers, truncated) = config.tracked_powers(perm.order(), perm.n());
        if truncated {
            warn!(
                order = perm.order(),
                n = perm.n(),
                tracked_powers,
                "symretope constraint truncated to configured power cap"
            );
        }
        Ok(Some((
            Self { perm, config, tracked_powers, truncated, needs_propagation: true },
            original_of,
        )))
    }

    pub fn permutation(&self) -> &Permutation {
        &self.perm
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// §9 "Dynamic dispatch to host": the host calls this whenever a bound
    /// relevant to this constraint changes; O(1) work.
    pub fn on_variable_bound_changed(&mut self, _index: usize) {
        self.needs_propagation = true;
    }

    /// Runs propagation to a fixpoint against `base`'s current bounds,
    /// committing every new fixing via `commit`. Returns the §6 exit
    /// condition.
    pub fn propagate(
        &mut self,
        base: &dyn BaseBounds,
        mut commit: impl FnMut(usize, bool, i64),
    ) -> Result<PropagationOutcome, SymretopeError> {
        if !self.needs_propagation {
            return Ok(PropagationOutcome::DidNotRun);
        }
        self.needs_propagation = false;

        let mut overlay = VirtualFixings::new(self.perm.n());
        let mut new_fixings = 0usize;
        let mut impactful = BTreeSet::new();

        let general_outcome = if self.perm.monotone() && self.perm.ordered() {
            monotone::run_monotone_ordered(&self.perm, &mut overlay, base, &mut impactful, |index, value| {
                commit(index, value, 1);
                new_fixings += 1;
            })?
        } else {
            let mut trees: Vec<TrackedPermutation> = orchestrator::init_tracked_powers(
                &self.perm,
                self.perm.n(),
                self.tracked_powers,
                self.truncated,
            );
            let outcome = orchestrator::run_to_fixpoint(
                &mut trees,
                &self.perm,
                &mut overlay,
                base,
                true,
                |index, value| {
                    commit(index, value, 1);
                    new_fixings += 1;
                },
            )?;
            for tp in &trees {
                record_impactful(&mut impactful, tp);
            }
            outcome
        };

        if let OrchestratorOutcome::Infeasible { power } = general_outcome {
            info!(power, "symretope constraint proved local infeasibility");
            return Ok(PropagationOutcome::Cutoff { inferinfo: power });
        }

        if self.config.peek {
            let peek_fixings =
                peek::run_peek(&self.perm, self.tracked_powers, &overlay, base, impactful)?;
            for (index, value) in peek_fixings {
                commit(index, value, PEEK_INFERINFO);
                new_fixings += 1;
            }
        }

        if new_fixings > 0 {
            Ok(PropagationOutcome::ReducedDomain { new_fixings })
        } else {
            Ok(PropagationOutcome::DidNotFind)
        }
    }

    /// §4.9 `check`.
    pub fn check(&self, solution: &[bool]) -> CheckResult {
        check::check(&self.perm, solution, self.tracked_powers)
    }
}

/// The general orchestrator's builder doesn't currently expose which
/// variables it actually read per tree; conservatively mark every tracked
/// power's support as impactful so the peek driver's candidate set is a
/// superset rather than risking a missed fixing.
fn record_impactful(impactful: &mut BTreeSet<usize>, tp: &TrackedPermutation) {
    for id in 0..tp.state.tree.capacity() {
        if tp.state.tree.is_allocated(id) {
            impactful.insert(symretope_core::tree::variable_of(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllUnfixed;
    impl BaseBounds for AllUnfixed {
        fn base_flags(&self, _index: usize) -> symretope_core::FixingFlags {
            symretope_core::FixingFlags::UNFIXED
        }
    }

    #[test]
    fn build_elides_trivial_all_fixed_point_permutation() {
        let raw = vec![0, 1, 2];
        let is_binary = vec![true, true, true];
        let built = SymretopeConstraint::build(&raw, &is_binary, SymretopeConfig::default()).unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn s1_four_cycle_propagate_finds_no_fixings() {
        let raw = vec![1, 2, 3, 0];
        let is_binary = vec![true, true, true, true];
        let (mut constraint, original_of) =
            SymretopeConstraint::build(&raw, &is_binary, SymretopeConfig::default())
                .unwrap()
                .unwrap();
        assert_eq!(original_of, vec![0, 1, 2, 3]);
        let base = AllUnfixed;
        let mut commits = Vec::new();
        let outcome = constraint
            .propagate(&base, |index, value, inferinfo| commits.push((index, value, inferinfo)))
            .unwrap();
        assert_eq!(outcome, PropagationOutcome::DidNotFind);
        assert!(commits.is_empty());
    }
}
