//! Data model for the symretope symmetry-breaking propagator.
//!
//! A symretope constraint enforces `x >= gamma^k(x)` lexicographically for
//! every `k >= 1` generated by a permutation `gamma` acting on a binary
//! vector. This crate owns the types the propagation engine
//! (`symretope-propagator`) mutates: the permutation's immutable cycle
//! structure, the 2-bit fixing encoding, the virtual-fixings overlay used for
//! hypothetical peek propagation, the pending-fixing queue, and the
//! implication-tree arena. It has no propagation logic of its own.

pub mod config;
pub mod errors;
pub mod fixing;
pub mod overlay;
pub mod permutation;
pub mod queue;
pub mod tree;

pub use config::SymretopeConfig;
pub use errors::{SymretopeBuildError, SymretopeError};
pub use fixing::{FixingFlags, Value};
pub use overlay::{BaseBounds, VirtualFixings};
pub use permutation::{compact_support, Cycle, Permutation};
pub use queue::{EnqueueOutcome, FixingQueue};
pub use tree::{ImplicationTree, NodeId, NodeKind, Predecessor, TreeNode};

/// The `inferinfo` value reserved for fixings committed by the peek driver
/// (§4.7, §4.8), as opposed to a direct surface-rule fixing where
/// `inferinfo` is the permutation power (`>= 0`) that produced it.
pub const PEEK_INFERINFO: i64 = -1;
