//! Error types for the symretope data model.
//!
//! Two tiers, mirroring the propagator crate's own split: [`SymretopeBuildError`]
//! covers the non-recoverable construction-time failures (malformed permutation
//! input), while [`SymretopeError`] covers the internal invariant violations that
//! should never happen outside of a bug and are guarded by assertions in debug
//! builds.

use thiserror::Error;

// BUILD ERROR
// ================================================================================================

/// Errors raised while constructing a [`crate::permutation::Permutation`] or
/// compacting the raw constraint input down to its binary, non-fixed-point
/// support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymretopeBuildError {
    #[error("permutation index {index} at position {position} is out of range [0, {n})")]
    IndexOutOfRange {
        position: usize,
        index: usize,
        n: usize,
    },

    #[error("permutation length {actual} does not match variable count {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("permutation index {index} appears more than once (first at {first}, again at {second})")]
    DuplicateIndex {
        index: usize,
        first: usize,
        second: usize,
    },
}

// INTERNAL ERROR
// ================================================================================================

/// Internal invariant violations. Per the design, propagation itself is total
/// and never fails with a recoverable error — these variants exist purely as
/// the release-mode fallback for conditions that `debug_assert!` catches
/// during development; a correct propagator never returns them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymretopeError {
    #[error("implication tree arena exhausted for permutation power {power} (capacity {capacity})")]
    ArenaExhausted { power: u64, capacity: usize },

    #[error("fixing queue overflow: attempted to track more than {capacity} pending fixings")]
    QueueOverflow { capacity: usize },

    #[error(
        "variable {index} observed with both bits cleared (forced-0 and forced-1 simultaneously)"
    )]
    ContradictoryFixingState { index: usize },

    #[error("permutation has no tracked powers but propagation was requested")]
    NoTrackedPowers,
}
