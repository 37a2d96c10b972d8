//! Deque of pending `(variable, value)` fixings, deduplicated against a
//! membership bitmap, with antecedent tagging for conflict reporting.
//!
//! The antecedent recorded alongside each pending entry is a permutation
//! power index (`p >= 0`, meaning gamma^p surfaced the fixing) or `-1` for a
//! peek-driver commit — the same convention `inferinfo` uses at the host
//! boundary (see [`crate::PEEK_INFERINFO`]).

use std::collections::VecDeque;

/// Outcome of [`FixingQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Newly queued.
    Queued,
    /// Already pending with the same value; no-op.
    AlreadyQueued,
    /// Pending with the opposite value. Carries the antecedent that was
    /// already recorded, so the caller can hand both powers to conflict
    /// analysis.
    Contradiction { existing_power: i64 },
}

#[derive(Debug, Clone)]
pub struct FixingQueue {
    n: usize,
    order: VecDeque<usize>,
    /// `Some(value)` while `index` has a pending entry.
    pending_value: Vec<Option<bool>>,
    /// Valid only while the corresponding `pending_value` entry is `Some`.
    per_perm_power: Vec<i64>,
}

impl FixingQueue {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            order: VecDeque::new(),
            pending_value: vec![None; n],
            per_perm_power: vec![0; n],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending_value[index].is_some()
    }

    /// The antecedent recorded for `index`'s pending entry, if any.
    pub fn pending_power(&self, index: usize) -> Option<i64> {
        self.pending_value[index].map(|_| self.per_perm_power[index])
    }

    pub fn enqueue(&mut self, index: usize, value: bool, power: i64) -> EnqueueOutcome {
        debug_assert!(index < self.n);
        match self.pending_value[index] {
            Some(existing) if existing == value => EnqueueOutcome::AlreadyQueued,
            Some(_) => EnqueueOutcome::Contradiction {
                existing_power: self.per_perm_power[index],
            },
            None => {
                self.pending_value[index] = Some(value);
                self.per_perm_power[index] = power;
                self.order.push_back(index);
                EnqueueOutcome::Queued
            }
        }
    }

    /// Pops the oldest pending entry, clearing its membership flag. Returns
    /// `(index, value, antecedent_power)`.
    pub fn drain_one(&mut self) -> Option<(usize, bool, i64)> {
        let index = self.order.pop_front()?;
        let value = self.pending_value[index].take()?;
        let power = self.per_perm_power[index];
        Some((index, value, power))
    }

    pub fn clear(&mut self) {
        while self.drain_one().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dedup_same_value_is_noop() {
        let mut q = FixingQueue::new(3);
        assert_eq!(q.enqueue(0, true, 1), EnqueueOutcome::Queued);
        assert_eq!(q.enqueue(0, true, 2), EnqueueOutcome::AlreadyQueued);
        // antecedent from the first enqueue is preserved.
        assert_eq!(q.pending_power(0), Some(1));
    }

    #[test]
    fn opposite_value_is_contradiction() {
        let mut q = FixingQueue::new(3);
        q.enqueue(0, true, 5);
        let outcome = q.enqueue(0, false, 9);
        assert_eq!(outcome, EnqueueOutcome::Contradiction { existing_power: 5 });
    }

    #[test]
    fn drain_is_fifo_and_clears_membership() {
        let mut q = FixingQueue::new(4);
        q.enqueue(2, true, 0);
        q.enqueue(1, false, 0);
        assert!(q.is_pending(2));
        assert_eq!(q.drain_one(), Some((2, true, 0)));
        assert!(!q.is_pending(2));
        assert_eq!(q.drain_one(), Some((1, false, 0)));
        assert_eq!(q.drain_one(), None);
    }
}
