//! The per-permutation implication tree builder (§4.4): the algorithm that
//! sweeps variable indices left to right for a single tracked power `σ` and
//! grows `T(σ)` one `(xi, xj)` step at a time, per the 3x3 table.
//!
//! Every tree has at most two live leaves (structural invariant 3). A leaf's
//! position is either still at the root (no branch created yet), resting on
//! an allocated node, or dead (its branch was pruned). The "effective fixing"
//! of a variable along a leaf's path is read by walking the leaf's
//! predecessor chain up to the root before falling back to the real bounds —
//! this is what lets a conditional ancestor's hypothesis shadow the host's
//! actual bound for the rest of that branch.

use std::collections::BTreeSet;

use smallvec::SmallVec;
use symretope_core::{
    BaseBounds, FixingFlags, FixingQueue, ImplicationTree, NodeKind, Permutation, Predecessor,
    SymretopeError, Value, VirtualFixings,
};

/// Where a tree's leaf currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafSlot {
    /// No branch has been created yet; this is the tree's single virtual
    /// leaf, conceptually sitting at the root.
    AtRoot,
    /// Resting on an allocated node.
    At(symretope_core::NodeId),
    /// This branch was pruned; nothing more to do for it.
    Dead,
}

/// All per-`σ` mutable state the orchestrator drives.
#[derive(Debug, Clone)]
pub struct PermutationState {
    /// The tracked power's exponent (`σ = γ^power`), always `>= 1`.
    pub power: i64,
    /// Next variable index the cursor will visit.
    pub cursor: usize,
    pub tree: ImplicationTree,
    pub leaves: [LeafSlot; 2],
}

impl PermutationState {
    pub fn new(n: usize, power: i64) -> Self {
        Self {
            power,
            cursor: 0,
            tree: ImplicationTree::new(n),
            leaves: [LeafSlot::AtRoot, LeafSlot::Dead],
        }
    }

    /// Resets the tree and cursor for a fresh `propagate` call, per the
    /// arena lifecycle ("trees are created empty at the start of a
    /// propagation call ... reset before the call returns").
    pub fn reset(&mut self) {
        self.tree.reset();
        self.cursor = 0;
        self.leaves = [LeafSlot::AtRoot, LeafSlot::Dead];
    }

    /// True once both of §4.4's structural conditions for "branched" hold:
    /// the root has a conditional child. Used by completeness precondition
    /// (2).
    pub fn has_branched(&self) -> bool {
        !matches!(self.leaves[0], LeafSlot::AtRoot) || !matches!(self.leaves[1], LeafSlot::Dead)
    }
}

/// Outcome of advancing a single `σ` by one or more cursor steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderOutcome {
    /// The completeness preconditions (§4.4) now hold; the orchestrator may
    /// stop advancing this permutation until an external fixing disturbs it.
    Stalled,
    /// Local infeasibility was proven along every live leaf.
    Infeasible,
    /// The cursor ran off the end of the support without stalling or failing
    /// (can happen once `i >= n`; treated the same as `Stalled`).
    Exhausted,
}

fn effective_fixing(
    tree: &ImplicationTree,
    leaf: LeafSlot,
    variable: usize,
    overlay: &VirtualFixings,
    base: &dyn BaseBounds,
    use_base_bounds: bool,
) -> FixingFlags {
    let mut cursor = leaf;
    loop {
        let id = match cursor {
            LeafSlot::At(id) => id,
            LeafSlot::AtRoot | LeafSlot::Dead => break,
        };
        let node = tree.node(id);
        if node.variable == variable {
            return if node.value {
                FixingFlags::FORCED_1
            } else {
                FixingFlags::FORCED_0
            };
        }
        cursor = match node.predecessor {
            Predecessor::Root => LeafSlot::AtRoot,
            Predecessor::Node(p) => LeafSlot::At(p),
        };
    }
    overlay.get(variable, base, use_base_bounds)
}

/// Appends a node for `(variable, value)` below `leaf`, returning its id. If
/// `leaf` is [`LeafSlot::AtRoot`], the new node becomes root child `slot`.
fn append(
    tree: &mut ImplicationTree,
    leaf: LeafSlot,
    slot: usize,
    kind: NodeKind,
    variable: usize,
    value: bool,
) -> Result<symretope_core::NodeId, SymretopeError> {
    let predecessor = match leaf {
        LeafSlot::AtRoot => Predecessor::Root,
        LeafSlot::At(id) => Predecessor::Node(id),
        LeafSlot::Dead => unreachable!("append called on a dead leaf"),
    };
    let id = tree.alloc(kind, variable, value, predecessor)?;
    match predecessor {
        Predecessor::Root => tree.set_root_child(slot, Some(id)),
        Predecessor::Node(parent) => tree.node_mut(parent).child = Some(id),
    }
    tree.set_leaf(slot, Some(id));
    Ok(id)
}

/// Surfaces the root's fixing into `queue` if it has exactly one child and
/// that child is a necessary node (§4.4 "surface rule"). Returns `true` if
/// the surfaced fixing contradicted one already pending on the same
/// variable (§4.3) — the caller must treat this as an immediate
/// infeasibility, since two tracked powers demanding opposite values for the
/// same variable can never both be satisfied.
#[must_use]
fn maybe_surface(tree: &ImplicationTree, queue: &mut FixingQueue, power: i64) -> bool {
    let [a, b] = tree.root_children();
    let only = match (a, b) {
        (Some(id), None) => Some(id),
        (None, Some(id)) => Some(id),
        _ => return false,
    };
    if let Some(id) = only {
        let node = tree.node(id);
        if node.kind == NodeKind::Necessary {
            return matches!(
                queue.enqueue(node.variable, node.value, power),
                symretope_core::EnqueueOutcome::Contradiction { .. }
            );
        }
    }
    false
}

/// Kills leaf `slot`: frees its whole chain down from the root, clears the
/// root-child link, and marks the leaf dead.
fn kill_leaf(state: &mut PermutationState, slot: usize) {
    if let Some(child) = state.tree.root_children()[slot] {
        state.tree.free_subtree(child);
    }
    state.tree.set_root_child(slot, None);
    state.tree.set_leaf(slot, None);
    state.leaves[slot] = LeafSlot::Dead;
}

/// The (0,1) collapse rule: walk from `slot`'s leaf toward the root deleting
/// necessary nodes, stopping at the nearest conditional ancestor or the
/// root. Returns `true` if the whole constraint is infeasible for this `σ`
/// (collapse reached the root).
fn collapse(
    state: &mut PermutationState,
    slot: usize,
    queue: &mut FixingQueue,
) -> Result<bool, SymretopeError> {
    let mut cursor = state.leaves[slot];
    let mut to_free: SmallVec<[symretope_core::NodeId; 4]> = SmallVec::new();
    let conditional_ancestor = loop {
        match cursor {
            LeafSlot::At(id) => {
                let node = state.tree.node(id);
                if node.kind == NodeKind::Conditional {
                    break Some(id);
                }
                to_free.push(id);
                cursor = match node.predecessor {
                    Predecessor::Root => LeafSlot::AtRoot,
                    Predecessor::Node(p) => LeafSlot::At(p),
                };
            }
            LeafSlot::AtRoot => break None,
            LeafSlot::Dead => unreachable!("collapse called on a dead leaf"),
        }
    };
    for id in to_free {
        state.tree.free(id);
    }

    let Some(a_id) = conditional_ancestor else {
        // reached the root: whole constraint infeasible under this sigma.
        return Ok(true);
    };

    let a_node = state.tree.node(a_id).clone();
    let a_slot = root_slot_of(state, a_id);
    let sibling_slot = 1 - a_slot;
    let sibling_root = state.tree.root_children()[sibling_slot];

    let mut surfaced_contradiction = false;
    match sibling_root {
        None => {
            // (a): no sibling. A's slot is keyed on its own (variable, value)
            // pair, so the opposite fixing cannot live there too — free A and
            // allocate a fresh node at (variable, !value) instead of mutating
            // A's `.value` in place, or the arena's node_id(variable, side)
            // indexing invariant breaks.
            if let Some(child) = a_node.child {
                state.tree.free_subtree(child);
            }
            state.tree.free(a_id);
            let replacement = state.tree.alloc(
                NodeKind::Necessary,
                a_node.variable,
                !a_node.value,
                a_node.predecessor,
            )?;
            state.tree.set_root_child(a_slot, Some(replacement));
            state.tree.set_leaf(a_slot, Some(replacement));
            state.leaves[a_slot] = LeafSlot::At(replacement);
            surfaced_contradiction = maybe_surface(&state.tree, queue, state.power);
        }
        Some(b_id) => {
            // (b): sibling B exists with (by the branching invariant) one
            // necessary child C of the opposite fixing. Splice A out and
            // promote C to A's old position.
            let b_node = state.tree.node(b_id).clone();
            let c_id = b_node
                .child
                .expect("branching sibling must have a necessary child");
            let c_node = state.tree.node(c_id).clone();
            debug_assert_eq!(c_node.variable, a_node.variable);
            debug_assert_ne!(c_node.value, a_node.value);

            state.tree.free(a_id);
            // rewire: parent(A) -> C -> B -> (old descendants of C). B keeps
            // its old fixing but now sits below C instead of at the root; C
            // itself is not freed, just moved.
            state.tree.node_mut(c_id).predecessor = Predecessor::Root;
            state.tree.node_mut(c_id).child = Some(b_id);
            let reparented_b = state.tree.node_mut(b_id);
            reparented_b.predecessor = Predecessor::Node(c_id);
            reparented_b.child = c_node.child;
            if let Some(grandchild) = c_node.child {
                state.tree.node_mut(grandchild).predecessor = Predecessor::Node(b_id);
            }
            state.tree.set_root_child(a_slot, Some(c_id));
            state.tree.set_root_child(sibling_slot, None);
            // the deepest surviving node on this merged chain is now the
            // live leaf; walk to find it.
            let mut tail = b_id;
            while let Some(next) = state.tree.try_node(tail).and_then(|n| n.child) {
                tail = next;
            }
            state.tree.set_leaf(a_slot, Some(tail));
            state.tree.set_leaf(sibling_slot, None);
            state.leaves[a_slot] = LeafSlot::At(tail);
            state.leaves[sibling_slot] = LeafSlot::Dead;
            surfaced_contradiction = maybe_surface(&state.tree, queue, state.power);
        }
    }
    Ok(surfaced_contradiction)
}

fn root_slot_of(state: &PermutationState, id: symretope_core::NodeId) -> usize {
    match state.tree.root_children() {
        [Some(x), _] if x == id => 0,
        [_, Some(x)] if x == id => 1,
        _ => unreachable!("node is not directly rooted; collapse only reaches conditional root children"),
    }
}

/// Advances `state`'s cursor through as many indices as it takes to either
/// hit the completeness preconditions, prove infeasibility, or run off the
/// support. Surfaced fixings are pushed into `queue` as they are produced.
pub fn advance(
    state: &mut PermutationState,
    perm: &Permutation,
    overlay: &VirtualFixings,
    base: &dyn BaseBounds,
    use_base_bounds: bool,
    queue: &mut FixingQueue,
    impactful: &mut BTreeSet<usize>,
) -> Result<BuilderOutcome, SymretopeError> {
    let n = perm.n();
    loop {
        if state.cursor >= n {
            return Ok(BuilderOutcome::Exhausted);
        }
        let i = state.cursor;
        let j = perm.inverse_apply(i, state.power);
        if i == j {
            state.cursor += 1;
            continue;
        }

        let mut any_live = false;
        // A leaf still `AtRoot` with its sibling `Dead` is the single
        // pre-branch virtual leaf; a `Dead` slot is simply skipped, so the
        // loop below naturally processes exactly one step in that case.
        for slot in 0..2 {
            if matches!(state.leaves[slot], LeafSlot::Dead) {
                continue;
            }
            any_live = true;
            let leaf = state.leaves[slot];
            let xi = effective_fixing(&state.tree, leaf, i, overlay, base, use_base_bounds);
            let xj = effective_fixing(&state.tree, leaf, j, overlay, base, use_base_bounds);
            impactful.insert(i);
            impactful.insert(j);
            let vi = xi.as_value().ok_or(SymretopeError::ContradictoryFixingState { index: i })?;
            let vj = xj.as_value().ok_or(SymretopeError::ContradictoryFixingState { index: j })?;

            match (vi, vj) {
                (Value::Zero, Value::Zero) | (Value::One, Value::One) => {}
                (Value::One, Value::Zero) => {
                    kill_leaf(state, slot);
                }
                (Value::Zero, Value::Free) => {
                    let new_leaf = append(&mut state.tree, leaf, slot, NodeKind::Necessary, j, false)?;
                    state.leaves[slot] = LeafSlot::At(new_leaf);
                    if maybe_surface(&state.tree, queue, state.power) {
                        return Ok(BuilderOutcome::Infeasible);
                    }
                }
                (Value::Free, Value::One) => {
                    let new_leaf = append(&mut state.tree, leaf, slot, NodeKind::Necessary, i, true)?;
                    state.leaves[slot] = LeafSlot::At(new_leaf);
                    if maybe_surface(&state.tree, queue, state.power) {
                        return Ok(BuilderOutcome::Infeasible);
                    }
                }
                (Value::One, Value::Free) => {
                    let new_leaf =
                        append(&mut state.tree, leaf, slot, NodeKind::Conditional, j, true)?;
                    state.leaves[slot] = LeafSlot::At(new_leaf);
                }
                (Value::Free, Value::Zero) => {
                    let new_leaf =
                        append(&mut state.tree, leaf, slot, NodeKind::Conditional, i, false)?;
                    state.leaves[slot] = LeafSlot::At(new_leaf);
                }
                (Value::Zero, Value::One) => {
                    if collapse(state, slot, queue)? {
                        return Ok(BuilderOutcome::Infeasible);
                    }
                }
                (Value::Free, Value::Free) => {
                    debug_assert!(matches!(leaf, LeafSlot::AtRoot));
                    let cond0 = append(&mut state.tree, LeafSlot::AtRoot, 0, NodeKind::Conditional, i, false)?;
                    let nec0 = append(&mut state.tree, LeafSlot::At(cond0), 0, NodeKind::Necessary, j, false)?;
                    let cond1 = append(&mut state.tree, LeafSlot::AtRoot, 1, NodeKind::Conditional, j, true)?;
                    let nec1 = append(&mut state.tree, LeafSlot::At(cond1), 1, NodeKind::Necessary, i, true)?;
                    state.leaves[0] = LeafSlot::At(nec0);
                    state.leaves[1] = LeafSlot::At(nec1);
                    // both leaves just advanced together as a single step;
                    // slot 1 must not be processed again for this i.
                    break;
                }
            }
        }

        if !any_live {
            return Ok(BuilderOutcome::Infeasible);
        }
        if state.leaves.iter().all(|l| matches!(l, LeafSlot::Dead)) {
            return Ok(BuilderOutcome::Infeasible);
        }
        state.cursor += 1;

        if completeness_holds(state, perm, overlay, base, use_base_bounds) {
            return Ok(BuilderOutcome::Stalled);
        }
    }
}

/// §4.4 "Completeness preconditions": the cursor may stop at `i` once all
/// four hold.
fn completeness_holds(
    state: &PermutationState,
    perm: &Permutation,
    overlay: &VirtualFixings,
    base: &dyn BaseBounds,
    use_base_bounds: bool,
) -> bool {
    let n = perm.n();
    let i = state.cursor;
    if i < n {
        if !state.has_branched() {
            return false;
        }
        let j = perm.inverse_apply(i, state.power);
        let xi = overlay.get(i, base, use_base_bounds);
        let xj = overlay.get(j, base, use_base_bounds);
        if xi.is_forced_0() || xj.is_forced_1() {
            return false;
        }
        let sigma_i = perm.apply(i, state.power);
        let sigma_inv_i = perm.inverse_apply(i, state.power);
        if !(sigma_i > i && sigma_inv_i > i) {
            return false;
        }
    }
    state.has_branched()
}

/// §4.4 "Reaction to external fixings": visits the (at most two) nodes keyed
/// on `variable` and either splices them out (if they agree with `value`) or
/// collapses from them (if they contradict it), then re-queues `σ` since its
/// completeness preconditions may now be stale.
pub fn react_to_fixing(
    state: &mut PermutationState,
    variable: usize,
    value: bool,
    queue: &mut FixingQueue,
) -> Result<bool, SymretopeError> {
    let id = symretope_core::tree::node_id(variable, value);
    let opposite_id = symretope_core::tree::node_id(variable, !value);
    let mut infeasible = false;

    if state.tree.is_allocated(opposite_id) {
        let slot = find_leaf_slot_containing(state, opposite_id);
        if let Some(slot) = slot {
            if collapse(state, slot, queue)? {
                infeasible = true;
            }
        }
    }
    if !infeasible && state.tree.is_allocated(id) {
        infeasible = splice_out(state, id, queue);
    }

    state.cursor = state.cursor.min(variable);
    Ok(infeasible)
}

/// Finds which root-rooted chain (if any) currently contains `id`, walking
/// down from whichever leaf is live. Cheap for the tree sizes this crate
/// deals with (bounded by the permutation's support).
fn find_leaf_slot_containing(state: &PermutationState, id: symretope_core::NodeId) -> Option<usize> {
    for slot in 0..2 {
        let mut cursor = state.leaves[slot];
        loop {
            match cursor {
                LeafSlot::At(cur) => {
                    if cur == id {
                        return Some(slot);
                    }
                    cursor = match state.tree.node(cur).predecessor {
                        Predecessor::Root => LeafSlot::AtRoot,
                        Predecessor::Node(p) => LeafSlot::At(p),
                    };
                }
                LeafSlot::AtRoot | LeafSlot::Dead => break,
            }
        }
    }
    None
}

/// Splices `id` out of its path: its child becomes the child of its
/// predecessor (or the new root child, if `id` was rooted directly), and if
/// `id` had a sibling at the root encoding the opposite assumption, that
/// whole subtree is deleted too (since the fixing just applied makes the
/// assumption moot). Returns `true` if this caused a surfaced fixing to
/// contradict one already pending on the same variable (§4.3).
fn splice_out(state: &mut PermutationState, id: symretope_core::NodeId, queue: &mut FixingQueue) -> bool {
    let node = state.tree.node(id).clone();
    match node.predecessor {
        Predecessor::Root => {
            let slot = root_slot_of(state, id);
            let other = 1 - slot;
            if let Some(sibling) = state.tree.root_children()[other] {
                state.tree.free_subtree(sibling);
                state.tree.set_root_child(other, None);
                state.tree.set_leaf(other, None);
                state.leaves[other] = LeafSlot::Dead;
            }
            state.tree.set_root_child(slot, node.child);
            if let Some(child) = node.child {
                state.tree.node_mut(child).predecessor = Predecessor::Root;
            }
            state.tree.free(id);
            if node.child.is_none() {
                state.leaves[slot] = LeafSlot::AtRoot;
                state.tree.set_leaf(slot, None);
            } else {
                let mut tail = node.child.unwrap();
                while let Some(next) = state.tree.try_node(tail).and_then(|n| n.child) {
                    tail = next;
                }
                state.leaves[slot] = LeafSlot::At(tail);
                state.tree.set_leaf(slot, Some(tail));
            }
            maybe_surface(&state.tree, queue, state.power)
        }
        Predecessor::Node(parent) => {
            state.tree.node_mut(parent).child = node.child;
            if let Some(child) = node.child {
                state.tree.node_mut(child).predecessor = Predecessor::Node(parent);
            } else {
                // id was a leaf: the parent becomes the new leaf.
                let slot = find_leaf_slot_containing(state, id).unwrap_or(0);
                state.leaves[slot] = LeafSlot::At(parent);
                state.tree.set_leaf(slot, Some(parent));
            }
            state.tree.free(id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symretope_core::VirtualFixings;

    struct AllUnfixed;
    impl BaseBounds for AllUnfixed {
        fn base_flags(&self, _index: usize) -> FixingFlags {
            FixingFlags::UNFIXED
        }
    }

    #[test]
    fn s1_four_cycle_all_unfixed_stalls_with_branch_but_no_fixings() {
        let perm = Permutation::build(&[1, 2, 3, 0]).unwrap();
        let overlay = VirtualFixings::new(4);
        let base = AllUnfixed;
        let mut state = PermutationState::new(4, 1);
        let mut queue = FixingQueue::new(4);
        let mut impactful = BTreeSet::new();
        let outcome = advance(&mut state, &perm, &overlay, &base, true, &mut queue, &mut impactful)
            .unwrap();
        assert_eq!(outcome, BuilderOutcome::Stalled);
        assert!(queue.is_empty());
        assert!(state.has_branched());
        let [a, b] = state.tree.root_children();
        assert!(a.is_some() && b.is_some());
    }

    #[test]
    fn s2_x0_forced_0_surfaces_x3_forced_0() {
        let perm = Permutation::build(&[1, 2, 3, 0]).unwrap();
        let overlay = VirtualFixings::new(4);
        struct X0Forced0;
        impl BaseBounds for X0Forced0 {
            fn base_flags(&self, index: usize) -> FixingFlags {
                if index == 0 {
                    FixingFlags::FORCED_0
                } else {
                    FixingFlags::UNFIXED
                }
            }
        }
        let base = X0Forced0;
        let mut state = PermutationState::new(4, 1);
        let mut queue = FixingQueue::new(4);
        let mut impactful = BTreeSet::new();
        advance(&mut state, &perm, &overlay, &base, true, &mut queue, &mut impactful).unwrap();
        // i=0,j=3: (x0,x3) = (0,*) -> necessary x3:=0, surfaces immediately.
        assert_eq!(queue.pending_power(3), Some(1));
    }
}
