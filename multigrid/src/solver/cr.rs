// SPDX-License-Identifier: AGPL-3.0-only

//! Conjugate Residual for Hermitian, possibly indefinite, `Op x = b`.
//!
//! Search directions are A-orthogonal in the ⟨Ap,Ap⟩ sense, so the step
//! never divides by ⟨p,Ap⟩ (which an indefinite operator can make zero).
//! Both `r` and `Ar` are carried, as are `p` and `Ap`; one operator
//! application per iteration.
//!
//! ```text
//! αₖ = ⟨rₖ,Arₖ⟩ / ‖Apₖ‖²
//! xₖ₊₁ = xₖ + αₖ pₖ,   rₖ₊₁ = rₖ − αₖ Apₖ
//! βₖ = ⟨rₖ₊₁,Arₖ₊₁⟩ / ⟨rₖ,Arₖ⟩
//! pₖ₊₁ = rₖ₊₁ + βₖ pₖ,   Apₖ₊₁ = Arₖ₊₁ + βₖ Apₖ
//! ```

use tracing::{debug, trace};

use super::{conclude, Exit, IterativeParams, IterativeProcess, OperatorFunction, SolverStats};
use crate::error::Result;
use crate::lattice::LatticeField;
use crate::operator::HermitianOperator;
use crate::tolerances::BREAKDOWN_REL;

const NAME: &str = "ConjugateResidual";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConjugateResidual {
    params: IterativeParams,
}

impl ConjugateResidual {
    pub fn new(tolerance: f64, max_iterations: usize) -> Result<Self> {
        Self::with_params(IterativeParams::new(tolerance, max_iterations)?)
    }

    pub fn with_params(params: IterativeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Solve `op x = b`; `x` holds the initial guess on entry and the last
    /// iterate on exit, converged or not.
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

        let mut ar = op.new_field()?;
        op.op(x, &mut ar)?;
        let mut r = op.new_field()?;
        r.assign_sub(b, &ar)?;

        let mut rr = r.norm_sq();
        let target_sq = self.params.tolerance * self.params.tolerance * b_norm_sq;
        let initial_residual = (rr / b_norm_sq).sqrt();

        let mut p = r.clone();
        let mut ar_sq = op.op_and_norm(&r, &mut ar)?;
        let mut ap_sq = ar_sq;
        let mut r_ar = r.dot(&ar)?.re;
        let mut ap = ar.clone();

        let mut iterations = 0;
        let mut breakdown = false;

        while rr > target_sq && iterations < self.params.max_iterations {
            // ⟨r,Ar⟩ is measured against ‖r‖‖Ar‖ so the test is scale free
            if ap_sq <= 0.0
                || !ap_sq.is_finite()
                || !r_ar.is_finite()
                || r_ar.abs() <= BREAKDOWN_REL * (rr * ar_sq).sqrt()
            {
                breakdown = true;
                break;
            }
            iterations += 1;

            let alpha = r_ar / ap_sq;
            x.axpy_real(alpha, &p)?;
            r.axpy_real(-alpha, &ap)?;

            ar_sq = op.op_and_norm(&r, &mut ar)?;
            let r_ar_new = r.dot(&ar)?.re;
            let beta = r_ar_new / r_ar;
            r_ar = r_ar_new;

            p.xpay(beta.into(), &r)?;
            ap.xpay(beta.into(), &ar)?;
            ap_sq = ap.norm_sq();
            rr = r.norm_sq();

            trace!(
                solver = NAME,
                iteration = iterations,
                residual = (rr / b_norm_sq).sqrt()
            );
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

impl Default for ConjugateResidual {
    fn default() -> Self {
        Self {
            params: IterativeParams::default(),
        }
    }
}

impl IterativeProcess for ConjugateResidual {
    fn params(&self) -> IterativeParams {
        self.params
    }
}

impl<L: HermitianOperator + ?Sized> OperatorFunction<L> for ConjugateResidual {
    type Output = SolverStats;

    fn call(&self, op: &L, input: &LatticeField, out: &mut LatticeField) -> Result<SolverStats> {
        self.solve(op, input, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarsening::{CoarsenedMatrix, DenseMatrix};
    use crate::lattice::{Checkerboard, Lattice};
    use crate::operator::{LinearOperator, MdagMLinearOperator, SelfAdjointLinearOperator};
    use crate::tolerances::{SOLVER_TOLERANCE, TRUE_RESIDUAL_SLACK};
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    /// Site-diagonal Hermitian operator with the given eigenvalues on every
    /// site.
    fn diagonal(lattice: &Arc<Lattice>, eigenvalues: &[f64]) -> CoarsenedMatrix {
        let n = eigenvalues.len();
        let mut m = CoarsenedMatrix::zeros(lattice, n).expect("zeros");
        let mut d = DenseMatrix::zeros(n);
        for (i, &e) in eigenvalues.iter().enumerate() {
            d.set(i, i, Complex64::new(e, 0.0));
        }
        for site in 0..lattice.volume() {
            m.set_link(site, m.self_point(), d.clone());
        }
        m
    }

    #[test]
    fn cr_indefinite_diagonal() {
        let lat = Arc::new(Lattice::new(&[4, 4]).expect("lattice"));
        let m = diagonal(&lat, &[-1.0, 2.0, 3.0, 5.0]);
        let op = SelfAdjointLinearOperator::new(&m);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let b = LatticeField::gaussian(&lat, 4, Checkerboard::Full, &mut rng).expect("b");
        let mut x = op.new_field().expect("x");

        let stats = ConjugateResidual::default().solve(&op, &b, &mut x).expect("solve");
        assert!(stats.converged);
        assert!(stats.true_residual < SOLVER_TOLERANCE * TRUE_RESIDUAL_SLACK);

        // Exact answer is b_i / λ_i componentwise.
        for site in 0..lat.volume() {
            for (c, lambda) in [-1.0, 2.0, 3.0, 5.0].iter().enumerate() {
                let expect = b.site(site)[c] / lambda;
                assert!((x.site(site)[c] - expect).norm() < 1e-4 * (1.0 + expect.norm()));
            }
        }
    }

    #[test]
    fn cr_agrees_with_cg_on_positive_operator() {
        let lat = Arc::new(Lattice::new(&[4, 2]).expect("lattice"));
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let m = CoarsenedMatrix::random(&lat, 2, 3.0, 0.3, &mut rng).expect("matrix");
        let op = MdagMLinearOperator::new(&m);
        let b = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("b");

        let solver = crate::solver::ConjugateGradient::new(1e-10, 1000).expect("cg");
        let mut x_cg = op.new_field().expect("x");
        solver.solve(&op, &b, &mut x_cg).expect("cg");

        let mut x_cr = op.new_field().expect("x");
        ConjugateResidual::new(1e-10, 1000)
            .expect("cr")
            .solve(&op, &b, &mut x_cr)
            .expect("cr");

        let mut diff = x_cr.zeros_like();
        diff.assign_sub(&x_cr, &x_cg).expect("sub");
        assert!(diff.norm() / x_cg.norm() < 1e-6);
    }

    #[test]
    fn cr_zero_source() {
        let lat = Arc::new(Lattice::new(&[2, 2]).expect("lattice"));
        let m = diagonal(&lat, &[-2.0, 1.0]);
        let op = SelfAdjointLinearOperator::new(&m);
        let b = op.new_field().expect("b");
        let mut x = op.new_field().expect("x");
        let stats = ConjugateResidual::default().solve(&op, &b, &mut x).expect("solve");
        assert_eq!(stats, SolverStats::trivial());
    }
}
