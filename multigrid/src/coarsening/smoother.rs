// SPDX-License-Identifier: AGPL-3.0-only

//! Smoothers that push random vectors toward the near-null space of a
//! Hermitian operator.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MultigridError, Result};
use crate::lattice::LatticeField;
use crate::operator::HermitianOperator;
use crate::solver::ConjugateGradient;
use crate::tolerances::{
    DIVISION_GUARD, LAMBDA_MAX_SAFETY, POWER_ITERATION_STEPS, SMOOTHER_CG_MAX_ITER,
    SMOOTHER_CG_TOLERANCE,
};

/// Smoothing applied to each seed vector before orthonormalisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Smoother {
    /// `passes` rounds of `v ← H⁻¹v / ‖H⁻¹v‖` with a loose CG solve.
    ///
    /// Needs `H` positive-definite. An unconverged solve still amplifies the
    /// low modes, so its partial result is used.
    InverseIteration {
        tolerance: f64,
        max_iterations: usize,
        passes: usize,
    },
    /// `sweeps` rounds of `v ← v − (damping / λ_max) H v`.
    Richardson { sweeps: usize, damping: f64 },
}

impl Default for Smoother {
    fn default() -> Self {
        Self::InverseIteration {
            tolerance: SMOOTHER_CG_TOLERANCE,
            max_iterations: SMOOTHER_CG_MAX_ITER,
            passes: 1,
        }
    }
}

impl Smoother {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::InverseIteration {
                tolerance,
                max_iterations,
                passes,
            } => {
                crate::solver::IterativeParams::new(tolerance, max_iterations)?;
                if passes == 0 {
                    return Err(MultigridError::InvalidParameter(
                        "inverse iteration needs at least one pass".into(),
                    ));
                }
            }
            Self::Richardson { sweeps, damping } => {
                if sweeps == 0 {
                    return Err(MultigridError::InvalidParameter(
                        "Richardson smoothing needs at least one sweep".into(),
                    ));
                }
                if !(damping > 0.0 && damping < 2.0) {
                    return Err(MultigridError::InvalidParameter(format!(
                        "Richardson damping must lie in (0, 2), got {damping}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Smooth `v` in place and normalise it.
    pub fn smooth<H: HermitianOperator + ?Sized>(&self, op: &H, v: &mut LatticeField) -> Result<()> {
        match *self {
            Self::InverseIteration {
                tolerance,
                max_iterations,
                passes,
            } => {
                let cg = ConjugateGradient::new(tolerance, max_iterations)?;
                let mut x = op.new_field()?;
                for _ in 0..passes {
                    x.set_zero();
                    match cg.solve(op, v, &mut x) {
                        Ok(_) => {}
                        Err(e) if e.has_partial_result() => {
                            debug!(error = %e, "using partial smoothing solve");
                        }
                        Err(e) => return Err(e),
                    }
                    v.copy_from(&x)?;
                    normalize(v)?;
                }
            }
            Self::Richardson { sweeps, damping } => {
                let lambda_max = estimate_lambda_max(op, v)?;
                let step = -damping / lambda_max;
                let mut hv = op.new_field()?;
                for _ in 0..sweeps {
                    op.op(v, &mut hv)?;
                    v.axpy_real(step, &hv)?;
                }
                normalize(v)?;
            }
        }
        Ok(())
    }
}

/// Scale to unit norm.
pub(crate) fn normalize(v: &mut LatticeField) -> Result<()> {
    let norm = v.norm();
    if norm <= DIVISION_GUARD {
        return Err(MultigridError::InvalidParameter(
            "cannot normalise a vanishing vector".into(),
        ));
    }
    v.scale(1.0 / norm);
    Ok(())
}

/// Bound on the largest |eigenvalue|: power iteration started from `seed`,
/// widened by [`LAMBDA_MAX_SAFETY`] since the iteration converges from below.
fn estimate_lambda_max<H: HermitianOperator + ?Sized>(op: &H, seed: &LatticeField) -> Result<f64> {
    let mut w = seed.clone();
    normalize(&mut w)?;
    let mut hw = op.new_field()?;
    let mut lambda = 0.0;
    for _ in 0..POWER_ITERATION_STEPS {
        lambda = op.op_and_norm(&w, &mut hw)?.sqrt();
        if lambda <= DIVISION_GUARD {
            return Err(MultigridError::InvalidParameter(
                "operator annihilates the smoothing seed".into(),
            ));
        }
        w.copy_from(&hw)?;
        w.scale_complex(Complex64::new(1.0 / lambda, 0.0));
    }
    let bound = lambda * LAMBDA_MAX_SAFETY;
    debug!(estimate = lambda, lambda_max = bound, "power iteration");
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarsening::{CoarsenedMatrix, DenseMatrix};
    use crate::lattice::{Checkerboard, Lattice};
    use crate::operator::SelfAdjointLinearOperator;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    /// Diagonal operator with eigenvalue 0.1 on component 0 and 10 on 1.
    fn split_spectrum(lattice: &Arc<Lattice>) -> CoarsenedMatrix {
        let mut d = DenseMatrix::zeros(2);
        d.set(0, 0, Complex64::new(0.1, 0.0));
        d.set(1, 1, Complex64::new(10.0, 0.0));
        let mut m = CoarsenedMatrix::zeros(lattice, 2).expect("zeros");
        for site in 0..lattice.volume() {
            m.set_link(site, m.self_point(), d.clone());
        }
        m
    }

    fn low_mode_weight(v: &LatticeField) -> f64 {
        (0..v.n_sites()).map(|i| v.site(i)[0].norm_sqr()).sum::<f64>() / v.norm_sq()
    }

    #[test]
    fn smoothers_amplify_low_modes() {
        let lattice = Arc::new(Lattice::new(&[4, 4]).expect("lattice"));
        let m = split_spectrum(&lattice);
        let op = SelfAdjointLinearOperator::new(&m);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let seed = LatticeField::gaussian(&lattice, 2, Checkerboard::Full, &mut rng).expect("seed");
        let before = low_mode_weight(&seed);

        for smoother in [
            Smoother::default(),
            Smoother::Richardson {
                sweeps: 4,
                damping: 0.9,
            },
        ] {
            let mut v = seed.clone();
            smoother.smooth(&op, &mut v).expect("smooth");
            assert!((v.norm() - 1.0).abs() < 1e-12);
            assert!(low_mode_weight(&v) > before);
            assert!(low_mode_weight(&v) > 0.99);
        }
    }

    /// Diagonal operator with a clustered top of the spectrum.
    fn clustered_spectrum(lattice: &Arc<Lattice>) -> CoarsenedMatrix {
        let eigenvalues = [0.1, 1.0, 10.0, 10.5];
        let mut d = DenseMatrix::zeros(eigenvalues.len());
        for (i, &e) in eigenvalues.iter().enumerate() {
            d.set(i, i, Complex64::new(e, 0.0));
        }
        let mut m = CoarsenedMatrix::zeros(lattice, eigenvalues.len()).expect("zeros");
        for site in 0..lattice.volume() {
            m.set_link(site, m.self_point(), d.clone());
        }
        m
    }

    fn mode_weight(v: &LatticeField, k: usize) -> f64 {
        (0..v.n_sites()).map(|i| v.site(i)[k].norm_sqr()).sum::<f64>() / v.norm_sq()
    }

    #[test]
    fn lambda_max_bound_is_not_below_top_eigenvalue() {
        let lattice = Arc::new(Lattice::new(&[4, 4]).expect("lattice"));
        let m = clustered_spectrum(&lattice);
        let op = SelfAdjointLinearOperator::new(&m);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let seed = LatticeField::gaussian(&lattice, 4, Checkerboard::Full, &mut rng).expect("seed");

        let bound = estimate_lambda_max(&op, &seed).expect("estimate");
        assert!(bound >= 10.5, "bound {bound} below λ_max");
        assert!(bound <= 10.5 * LAMBDA_MAX_SAFETY);
    }

    #[test]
    fn near_critical_damping_still_damps_top_mode() {
        let lattice = Arc::new(Lattice::new(&[4, 4]).expect("lattice"));
        let m = clustered_spectrum(&lattice);
        let op = SelfAdjointLinearOperator::new(&m);
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let seed = LatticeField::gaussian(&lattice, 4, Checkerboard::Full, &mut rng).expect("seed");
        let ratio = |v: &LatticeField| mode_weight(v, 3) / mode_weight(v, 0);
        let before = ratio(&seed);

        let mut v = seed.clone();
        Smoother::Richardson {
            sweeps: 10,
            damping: 1.99,
        }
        .smooth(&op, &mut v)
        .expect("smooth");
        assert!(ratio(&v) < before, "top mode grew against the low mode");
    }

    #[test]
    fn invalid_settings_rejected() {
        assert!(Smoother::default().validate().is_ok());
        assert!(Smoother::Richardson {
            sweeps: 0,
            damping: 1.0
        }
        .validate()
        .is_err());
        assert!(Smoother::Richardson {
            sweeps: 2,
            damping: 2.5
        }
        .validate()
        .is_err());
        assert!(Smoother::InverseIteration {
            tolerance: 1e-2,
            max_iterations: 10,
            passes: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn smoother_config_from_json() {
        let s: Smoother =
            serde_json::from_str(r#"{"kind": "richardson", "sweeps": 3, "damping": 0.5}"#)
                .expect("json");
        assert_eq!(
            s,
            Smoother::Richardson {
                sweeps: 3,
                damping: 0.5
            }
        );
    }
}
