//! Immutable precomputation over a raw index map `perm[i] -> where i moves to`.
//!
//! Built once per constraint from a trusted permutation (fixed points and
//! non-binary indices already compacted out by the caller), then queried in
//! O(1) for the rest of the constraint's lifetime: cycle membership, position
//! within cycle, and `apply(i, k)` = gamma^k(i).

use crate::errors::SymretopeBuildError;

/// `lcm(a, b)`, saturating at `u64::MAX` rather than overflowing — the group
/// order is only ever used as a loop bound, so saturation is a safe ceiling.
fn lcm_saturating(a: u64, b: u64) -> u64 {
    fn gcd(mut a: u64, mut b: u64) -> u64 {
        while b != 0 {
            (a, b) = (b, a % b);
        }
        a
    }
    let g = gcd(a, b);
    if g == 0 {
        return 0;
    }
    (a / g).saturating_mul(b)
}

/// A single cycle of the permutation, in traversal order (`cycle[p+1] =
/// gamma(cycle[p])`).
pub type Cycle = Vec<usize>;

/// Precomputed cycle structure of a permutation over the dense index range
/// `[0, n)`.
///
/// Per the data model invariant, `map` must not contain fixed points: callers
/// compact those (and non-binary variables) out before calling [`Self::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    n: usize,
    map: Vec<usize>,
    cycles: Vec<Cycle>,
    cycle_of: Vec<usize>,
    pos_in_cycle: Vec<usize>,
    cycle_len: Vec<usize>,
    order: u64,
    monotone: bool,
    ordered: bool,
}

impl Permutation {
    /// Scans `map` left to right, walking each unvisited cycle once.
    ///
    /// Validates that `map` is a bijection on `[0, map.len())`: every entry is
    /// in range and no two positions map to the same target. Does not reject
    /// fixed points — those are the caller's responsibility to have compacted
    /// out already (see [`crate::compact_support`]), since a power of `map`
    /// (not `map` itself) is allowed to have fixed points in the propagation
    /// logic that consumes this type.
    pub fn build(map: &[usize]) -> Result<Self, SymretopeBuildError> {
        let n = map.len();
        let mut seen_from = vec![false; n];
        for (position, &index) in map.iter().enumerate() {
            if index >= n {
                return Err(SymretopeBuildError::IndexOutOfRange { position, index, n });
            }
        }
        let mut first_seen_at = vec![usize::MAX; n];
        for (position, &index) in map.iter().enumerate() {
            if first_seen_at[index] != usize::MAX {
                return Err(SymretopeBuildError::DuplicateIndex {
                    index,
                    first: first_seen_at[index],
                    second: position,
                });
            }
            first_seen_at[index] = position;
        }

        let mut cycles = Vec::new();
        let mut cycle_of = vec![usize::MAX; n];
        let mut pos_in_cycle = vec![0usize; n];
        let mut cycle_len = Vec::new();
        let mut order: u64 = 1;
        let mut monotone = true;
        let mut ordered = true;
        let mut prev_cycle_max: Option<usize> = None;

        for start in 0..n {
            if seen_from[start] {
                continue;
            }
            let cycle_id = cycles.len();
            let mut cycle = Vec::new();
            let mut descents = 0usize;
            let mut cycle_max = start;
            let mut j = start;
            loop {
                seen_from[j] = true;
                cycle_of[j] = cycle_id;
                pos_in_cycle[j] = cycle.len();
                cycle.push(j);
                cycle_max = cycle_max.max(j);
                let next = map[j];
                if next < j {
                    descents += 1;
                }
                j = next;
                if j == start {
                    break;
                }
            }
            if descents > 1 {
                monotone = false;
            }
            if let Some(prev_max) = prev_cycle_max {
                if cycle_max < prev_max {
                    ordered = false;
                }
            }
            prev_cycle_max = Some(cycle_max);

            order = lcm_saturating(order, cycle.len() as u64);
            cycle_len.push(cycle.len());
            cycles.push(cycle);
        }

        Ok(Self {
            n,
            map: map.to_vec(),
            cycles,
            cycle_of,
            pos_in_cycle,
            cycle_len,
            order,
            monotone,
            ordered,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn map(&self) -> &[usize] {
        &self.map
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn cycle_of(&self, i: usize) -> usize {
        self.cycle_of[i]
    }

    pub fn pos_in_cycle(&self, i: usize) -> usize {
        self.pos_in_cycle[i]
    }

    pub fn cycle_len_of(&self, i: usize) -> usize {
        self.cycle_len[self.cycle_of[i]]
    }

    pub fn cycle_len(&self, cycle_id: usize) -> usize {
        self.cycle_len[cycle_id]
    }

    /// lcm of all cycle lengths; dominates the loop bound on tracked powers.
    /// Saturates at `u64::MAX` rather than overflowing.
    pub fn order(&self) -> u64 {
        self.order
    }

    /// Each cycle's traversal has at most one descent (`gamma(j) < j`).
    pub fn monotone(&self) -> bool {
        self.monotone
    }

    /// Cycle maxima are non-decreasing in input (cycle-discovery) order.
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// `gamma^k(i)`, O(1). Negative `k` is normalized via the cycle's length.
    pub fn apply(&self, i: usize, k: i64) -> usize {
        let len = self.cycle_len[self.cycle_of[i]] as i64;
        let pos = self.pos_in_cycle[i] as i64;
        let new_pos = (pos + k).rem_euclid(len) as usize;
        self.cycles[self.cycle_of[i]][new_pos]
    }

    /// `gamma^{-k}(i)`, equivalent to `apply(i, -k)`.
    pub fn inverse_apply(&self, i: usize, k: i64) -> usize {
        self.apply(i, -k)
    }

    /// Writes the dense map `gamma^k` into `out` (`out.len() == n`), O(n).
    pub fn power_map(&self, k: i64, out: &mut [usize]) {
        debug_assert_eq!(out.len(), self.n);
        for cycle in &self.cycles {
            let len = cycle.len() as i64;
            for (pos, &var) in cycle.iter().enumerate() {
                let new_pos = (pos as i64 + k).rem_euclid(len) as usize;
                out[var] = cycle[new_pos];
            }
        }
    }
}

/// Drops non-binary and fixed-point indices from a raw `[0, n')` permutation,
/// returning the compacted permutation map over the remaining `n <= n'`
/// indices together with the mapping from compacted index back to original
/// variable position (so the caller can recover which host variable a
/// compacted index refers to).
///
/// Per the data model invariant this is the step that must run before
/// [`Permutation::build`]; `build` itself does not tolerate fixed points.
pub fn compact_support(perm: &[usize], is_binary: &[bool]) -> (Vec<usize>, Vec<usize>) {
    debug_assert_eq!(perm.len(), is_binary.len());
    let n_prime = perm.len();
    let keep: Vec<bool> = (0..n_prime)
        .map(|i| is_binary[i] && is_binary[perm[i]] && perm[i] != i)
        .collect();
    let mut new_index = vec![usize::MAX; n_prime];
    let mut original_of = Vec::new();
    for i in 0..n_prime {
        if keep[i] {
            new_index[i] = original_of.len();
            original_of.push(i);
        }
    }
    let compacted_map = original_of.iter().map(|&i| new_index[perm[i]]).collect();
    (compacted_map, original_of)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cycle_is_monotone_and_ordered() {
        let p = Permutation::build(&[1, 2, 3, 0]).unwrap();
        assert_eq!(p.order(), 4);
        assert!(p.monotone());
        assert!(p.ordered());
        assert_eq!(p.apply(0, 1), 1);
        assert_eq!(p.apply(0, -1), 3);
        assert_eq!(p.apply(2, 2), 0);
    }

    #[test]
    fn three_disjoint_transpositions() {
        let p = Permutation::build(&[1, 0, 3, 2, 5, 4]).unwrap();
        assert_eq!(p.order(), 2);
        assert_eq!(p.cycles().len(), 3);
        assert!(p.monotone());
        assert!(p.ordered());
    }

    #[test]
    fn power_map_matches_repeated_apply() {
        let p = Permutation::build(&[1, 2, 0, 4, 3]).unwrap();
        let mut out = vec![0usize; 5];
        for k in -3i64..=3 {
            p.power_map(k, &mut out);
            for i in 0..5 {
                assert_eq!(out[i], p.apply(i, k), "mismatch at i={i}, k={k}");
            }
        }
    }

    #[test]
    fn out_of_range_index_rejected() {
        let err = Permutation::build(&[1, 5, 0]).unwrap_err();
        assert!(matches!(err, SymretopeBuildError::IndexOutOfRange { .. }));
    }

    #[test]
    fn duplicate_index_rejected() {
        let err = Permutation::build(&[1, 1, 0]).unwrap_err();
        assert!(matches!(err, SymretopeBuildError::DuplicateIndex { .. }));
    }

    #[test]
    fn non_monotone_cycle_detected() {
        // cycle 0 -> 2 -> 1 -> 3 -> 0: descents at 2->1 and 3->0 (two descents).
        let p = Permutation::build(&[2, 3, 1, 0]).unwrap();
        assert!(!p.monotone());
    }

    #[test]
    fn compact_support_drops_fixed_points_and_non_binary() {
        let perm = vec![1, 0, 2, 4, 3];
        let is_binary = vec![true, true, false, true, true];
        let (compacted, original_of) = compact_support(&perm, &is_binary);
        // index 2 is non-binary and a fixed point; indices 0,1 form a 2-cycle;
        // indices 3,4 form a 2-cycle.
        assert_eq!(original_of, vec![0, 1, 3, 4]);
        assert_eq!(compacted, vec![1, 0, 3, 2]);
    }
}
