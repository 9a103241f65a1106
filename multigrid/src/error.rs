// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for operator application, Krylov solves, and coarsening.
//!
//! Every failure is reported to the immediate caller. Nothing in the crate
//! retries internally or terminates the host process; whether to rerun with
//! a larger iteration budget or a fresh random seed is the caller's call.

use std::fmt;

use thiserror::Error;

use crate::lattice::Checkerboard;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MultigridError>;

/// Lattice, checkerboard and per-site width of a field or operator domain.
///
/// Carried by [`MultigridError::IncompatibleOperand`] so the message names
/// both sides of the mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldShape {
    pub dims: Vec<usize>,
    pub checkerboard: Checkerboard,
    pub site_dof: usize,
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} lattice, {:?} sites, {} dof/site",
            self.dims, self.checkerboard, self.site_dof
        )
    }
}

/// Errors arising from operator application, solving, or coarsening.
#[derive(Debug, Error)]
pub enum MultigridError {
    /// Field lattice, parity or per-site width does not match the domain.
    ///
    /// Raised before any arithmetic touches the operands.
    #[error("incompatible operand: expected {expected}, found {found}")]
    IncompatibleOperand {
        expected: FieldShape,
        found: FieldShape,
    },

    /// An iterative process ran out of iterations (or broke down).
    ///
    /// The solution buffer passed by the caller holds the last iterate.
    #[error("{solver} did not converge after {iterations} iterations (relative residual {residual:.3e})")]
    NonConvergence {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Block-local orthonormalisation produced a (near) zero vector.
    #[error("degenerate basis: vector {vector} is linearly dependent within block {block}")]
    DegenerateBasis { block: usize, vector: usize },

    /// Lattice extents or blocking are unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A configuration value is outside its admissible range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operator variant cannot perform the requested action.
    #[error("{operator} does not support {action}")]
    UnsupportedAction {
        operator: &'static str,
        action: &'static str,
    },

    /// A site-diagonal block could not be inverted.
    #[error("site-diagonal matrix at site {site} is singular")]
    SingularSiteMatrix { site: usize },
}

impl MultigridError {
    /// Build an [`IncompatibleOperand`](Self::IncompatibleOperand) error.
    pub(crate) fn incompatible(expected: FieldShape, found: FieldShape) -> Self {
        Self::IncompatibleOperand { expected, found }
    }

    /// Whether this error leaves a usable (partial) result behind.
    #[must_use]
    pub const fn has_partial_result(&self) -> bool {
        matches!(self, Self::NonConvergence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dims: &[usize], checkerboard: Checkerboard, site_dof: usize) -> FieldShape {
        FieldShape {
            dims: dims.to_vec(),
            checkerboard,
            site_dof,
        }
    }

    #[test]
    fn display_incompatible_operand() {
        let err = MultigridError::incompatible(
            shape(&[4, 4], Checkerboard::Full, 3),
            shape(&[4, 4], Checkerboard::Odd, 3),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("incompatible operand"));
        assert!(msg.contains("Full"));
        assert!(msg.contains("Odd"));
    }

    #[test]
    fn display_non_convergence() {
        let err = MultigridError::NonConvergence {
            solver: "ConjugateGradient",
            iterations: 10,
            residual: 0.5,
        };
        assert_eq!(
            err.to_string(),
            "ConjugateGradient did not converge after 10 iterations (relative residual 5.000e-1)"
        );
        assert!(err.has_partial_result());
    }

    #[test]
    fn display_degenerate_basis() {
        let err = MultigridError::DegenerateBasis { block: 3, vector: 1 };
        assert!(err.to_string().contains("block 3"));
        assert!(!err.has_partial_result());
    }

    #[test]
    fn error_trait_works() {
        let err = MultigridError::UnsupportedAction {
            operator: "MdagMLinearOperator",
            action: "op_dir",
        };
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "MdagMLinearOperator does not support op_dir");
    }
}
