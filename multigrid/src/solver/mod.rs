// SPDX-License-Identifier: AGPL-3.0-only

//! Krylov solvers over any [`LinearOperator`].
//!
//! | Solver | Operator class | Step sizes from |
//! |--------|----------------|-----------------|
//! | [`ConjugateGradient`] | Hermitian positive-definite | ⟨r,r⟩, ⟨p,Ap⟩ |
//! | [`ConjugateResidual`] | Hermitian, possibly indefinite | ⟨r,Ar⟩, ‖Ap‖² |
//!
//! Both stop when the recursive residual satisfies ‖r‖ ≤ tol·‖b‖ and fail
//! with `NonConvergence` once the iteration budget is spent. The iterate is
//! left in `x` either way.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MultigridError, Result};
use crate::lattice::LatticeField;
use crate::operator::LinearOperator;
use crate::tolerances::{SOLVER_MAX_ITER, SOLVER_TOLERANCE};

/// Conjugate gradient.
pub mod cg;
/// Conjugate residual.
pub mod cr;

pub use cg::ConjugateGradient;
pub use cr::ConjugateResidual;

/// A computation driven by repeated applications of an operator of type `L`.
pub trait OperatorFunction<L: ?Sized> {
    type Output;

    /// Consume `input` and write the result to `out`.
    fn call(&self, op: &L, input: &LatticeField, out: &mut LatticeField) -> Result<Self::Output>;
}

/// Termination policy shared by every iterative process.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterativeParams {
    /// Relative residual target ‖b − Op x‖ / ‖b‖.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl IterativeParams {
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self> {
        let params = Self {
            tolerance,
            max_iterations,
        };
        params.validate()?;
        Ok(params)
    }

    /// Tolerance must be finite and positive, the budget at least one.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MultigridError::InvalidParameter(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(MultigridError::InvalidParameter(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IterativeParams {
    fn default() -> Self {
        Self {
            tolerance: SOLVER_TOLERANCE,
            max_iterations: SOLVER_MAX_ITER,
        }
    }
}

/// An [`OperatorFunction`] with a fixed tolerance and iteration budget.
pub trait IterativeProcess {
    fn params(&self) -> IterativeParams;

    fn tolerance(&self) -> f64 {
        self.params().tolerance
    }

    fn max_iterations(&self) -> usize {
        self.params().max_iterations
    }
}

/// Solver result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    pub converged: bool,
    pub iterations: usize,
    /// Recursive residual ‖r‖ / ‖b‖ at exit.
    pub final_residual: f64,
    /// Recomputed ‖b − Op x‖ / ‖b‖ at exit.
    pub true_residual: f64,
    pub initial_residual: f64,
}

impl SolverStats {
    /// Result of a solve with a vanishing right-hand side.
    #[must_use]
    pub const fn trivial() -> Self {
        Self {
            converged: true,
            iterations: 0,
            final_residual: 0.0,
            true_residual: 0.0,
            initial_residual: 0.0,
        }
    }
}

/// State of a Krylov loop when it stops.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Exit {
    pub iterations: usize,
    pub residual_sq: f64,
    pub initial_residual: f64,
    pub breakdown: bool,
}

/// Recompute the true residual and turn a loop exit into the solve result.
pub(crate) fn conclude<L: LinearOperator + ?Sized>(
    solver: &'static str,
    params: IterativeParams,
    op: &L,
    b: &LatticeField,
    x: &LatticeField,
    b_norm_sq: f64,
    exit: Exit,
) -> Result<SolverStats> {
    let mut residual = op.new_field()?;
    op.op(x, &mut residual)?;
    residual.xpay(Complex64::new(-1.0, 0.0), b)?;
    let true_residual = (residual.norm_sq() / b_norm_sq).sqrt();
    let final_residual = (exit.residual_sq / b_norm_sq).sqrt();
    let converged = final_residual <= params.tolerance;

    if converged {
        info!(
            solver,
            iterations = exit.iterations,
            residual = final_residual,
            true_residual,
            "converged"
        );
        Ok(SolverStats {
            converged,
            iterations: exit.iterations,
            final_residual,
            true_residual,
            initial_residual: exit.initial_residual,
        })
    } else {
        warn!(
            solver,
            iterations = exit.iterations,
            residual = final_residual,
            tolerance = params.tolerance,
            breakdown = exit.breakdown,
            "not converged"
        );
        Err(MultigridError::NonConvergence {
            solver,
            iterations: exit.iterations,
            residual: final_residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_validation() {
        assert!(IterativeParams::new(1e-8, 100).is_ok());
        assert!(IterativeParams::new(0.0, 100).is_err());
        assert!(IterativeParams::new(-1.0, 100).is_err());
        assert!(IterativeParams::new(f64::NAN, 100).is_err());
        assert!(IterativeParams::new(1e-8, 0).is_err());
    }

    #[test]
    fn params_from_json() {
        let p: IterativeParams =
            serde_json::from_str(r#"{"tolerance": 1e-6, "max_iterations": 10000}"#).expect("json");
        assert_eq!(p.max_iterations, 10_000);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn default_params_are_valid() {
        assert!(IterativeParams::default().validate().is_ok());
    }
}
