//! Error types returned by the merge core.
//!
//! Following the rest of this crate, errors are a plain enum implementing
//! `Display`/`Error` and are returned directly with `?` rather than boxed
//! behind `anyhow`. The CLI matches on variants to pick a process exit code.

use std::fmt;

/// Everything that can go wrong while merging two constraint trees.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// The two constraint trees share at least one leaf. Inputs to `merge`
    /// must be defined over disjoint taxon sets.
    DisjointnessViolated,

    /// The union of the two trees' leaf sets does not match the taxa named
    /// in the distance matrix.
    LeafSetMismatch,

    /// Every candidate join at some step was rejected by the compatibility
    /// oracle; no topology exists that is simultaneously consistent with
    /// both constraint trees and a valid NJ agglomeration order.
    ConstraintInfeasible,

    /// The distance matrix did not supply a finite entry for a taxon pair
    /// the algorithm needed.
    BadDistance { a: String, b: String },

    /// A Newick or PHYLIP document could not be parsed.
    ParseError(String),

    /// I/O failure reading or writing a tree/matrix file.
    Io(String),

    /// An invariant of the merge core was violated. Seeing this means a bug
    /// in this crate, not bad input.
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::DisjointnessViolated => {
                write!(f, "the two constraint trees do not have disjoint leaf sets")
            }
            CoreError::LeafSetMismatch => write!(
                f,
                "the union of the constraint trees' leaves does not match the distance matrix's taxa"
            ),
            CoreError::ConstraintInfeasible => write!(
                f,
                "no join order exists that is compatible with both constraint trees"
            ),
            CoreError::BadDistance { a, b } => {
                write!(f, "missing or non-finite distance between '{a}' and '{b}'")
            }
            CoreError::ParseError(msg) => write!(f, "parse error: {msg}"),
            CoreError::Io(msg) => write!(f, "I/O error: {msg}"),
            CoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}
