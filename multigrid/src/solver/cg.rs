// SPDX-License-Identifier: AGPL-3.0-only

//! Conjugate Gradient for Hermitian positive-definite `Op x = b`.
//!
//! # Algorithm
//!
//! ```text
//! r₀ = b − Op x₀,  p₀ = r₀
//! αₖ = ⟨rₖ,rₖ⟩ / ⟨pₖ,Op pₖ⟩
//! xₖ₊₁ = xₖ + αₖ pₖ,   rₖ₊₁ = rₖ − αₖ Op pₖ
//! βₖ = ⟨rₖ₊₁,rₖ₊₁⟩ / ⟨rₖ,rₖ⟩,   pₖ₊₁ = rₖ₊₁ + βₖ pₖ
//! ```
//!
//! stopping at ‖rₖ‖ ≤ tol·‖b‖.
//!
//! # References
//!
//! - Hestenes & Stiefel (1952)
//! - Saad, "Iterative Methods for Sparse Linear Systems" (2003), §6.7

use tracing::{debug, trace};

use super::{conclude, Exit, IterativeParams, IterativeProcess, OperatorFunction, SolverStats};
use crate::error::Result;
use crate::lattice::LatticeField;
use crate::operator::HermitianOperator;

const NAME: &str = "ConjugateGradient";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConjugateGradient {
    params: IterativeParams,
}

impl ConjugateGradient {
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self> {
        Self::with_params(IterativeParams::new(tolerance, max_iterations)?)
    }

    pub fn with_params(params: IterativeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Solve `op x = b`; `x` holds the initial guess on entry.
    ///
    /// On `NonConvergence`, `x` holds the last iterate.
    pub fn solve<L: HermitianOperator + ?Sized>(
        &self,
        op: &L,
        b: &LatticeField,
        x: &mut LatticeField,
    ) -> Result<SolverStats> {
        op.ensure_operands(b, x)?;

        let b_norm_sq = b.norm_sq();
        if b_norm_sq == 0.0 {
            debug!(solver = NAME, "zero right-hand side");
            x.set_zero();
            return Ok(SolverStats::trivial());
        }

        // r = b - A x
        let mut ap = op.new_field()?;
        op.op(x, &mut ap)?;
        let mut r = op.new_field()?;
        r.assign_sub(b, &ap)?;

        let mut rr = r.norm_sq();
        let target_sq = self.params.tolerance * self.params.tolerance * b_norm_sq;
        let initial_residual = (rr / b_norm_sq).sqrt();

        let mut p = r.clone();
        let mut iterations = 0;
        let mut breakdown = false;

        while rr > target_sq && iterations < self.params.max_iterations {
            iterations += 1;

            op.op(&p, &mut ap)?;
            let p_ap = p.dot(&ap)?.re;
            // the operator is not definite along p
            if p_ap <= 0.0 || !p_ap.is_finite() {
                breakdown = true;
                break;
            }
            let alpha = rr / p_ap;

            x.axpy_real(alpha, &p)?;
            r.axpy_real(-alpha, &ap)?;

            let rr_new = r.norm_sq();
            trace!(
                solver = NAME,
                iteration = iterations,
                residual = (rr_new / b_norm_sq).sqrt()
            );

            // p = r + beta p
            let beta = rr_new / rr;
            rr = rr_new;
            p.xpay(beta.into(), &r)?;
        }

        conclude(
            NAME,
            self.params,
            op,
            b,
            x,
            b_norm_sq,
            Exit {
                iterations,
                residual_sq: rr,
                initial_residual,
                breakdown,
            },
        )
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self {
            params: IterativeParams::default(),
        }
    }
}

impl IterativeProcess for ConjugateGradient {
    fn params(&self) -> IterativeParams {
        self.params
    }
}

impl<L: HermitianOperator + ?Sized> OperatorFunction<L> for ConjugateGradient {
    type Output = SolverStats;

    fn call(&self, op: &L, input: &LatticeField, out: &mut LatticeField) -> Result<SolverStats> {
        self.solve(op, input, out)
    }
}
