//! Propagator-level errors and the `propagate` exit-condition enum.
//!
//! The engine reuses [`symretope_core::SymretopeError`] for the "should never
//! happen" internal cases; this module adds the one error type that is
//! genuinely recoverable at the engine's boundary: a malformed textual form
//! handed to `parse`.

use thiserror::Error;

/// Errors raised by [`crate::host::parse_textual_form`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected textual form `symretope([...],[...])`, got: {0:?}")]
    MalformedForm(String),

    #[error("variable list and permutation list have different lengths ({vars} vs {perm})")]
    LengthMismatch { vars: usize, perm: usize },

    #[error("permutation entry {0:?} is not an integer")]
    NotAnInteger(String),
}

/// The four outcomes §6 "Exit conditions" allows `propagate` to report.
/// Per §7, propagation itself is total — this is returned instead of a
/// `Result`, with `Err` reserved for the genuinely-impossible
/// [`symretope_core::SymretopeError`] cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// Local infeasibility was proven; carries the conflicting power (or
    /// [`symretope_core::PEEK_INFERINFO`] if it was the peek driver).
    Cutoff { inferinfo: i64 },
    /// At least one new fixing was derived and committed to the host.
    ReducedDomain { new_fixings: usize },
    /// The fixpoint was reached with no new information.
    DidNotFind,
    /// The constraint's affected-entries flag was clear; propagation did not
    /// run at all.
    DidNotRun,
}
