// SPDX-License-Identifier: AGPL-3.0-only

//! Block-aggregated near-null-space basis.
//!
//! `n_basis` full-lattice fields, orthonormal within every block of a
//! [`Blocking`]. Together they define
//!
//! ```text
//! promote (P):  coarse c  ↦  v(x) = Σ_i φ_i(x) c_i(B(x))
//! project (R):  fine v    ↦  c_i(B) = Σ_{x ∈ B} ⟨φ_i(x), v(x)⟩       R = P†
//! ```
//!
//! with `R P = 1` on coarse fields because of block orthonormality.

use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::smoother::{normalize, Smoother};
use crate::error::{MultigridError, Result};
use crate::lattice::{Blocking, Checkerboard, Lattice, LatticeField};
use crate::operator::HermitianOperator;
use crate::tolerances::BASIS_DEGENERACY_REL;

/// How to build a subspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubspaceConfig {
    pub n_basis: usize,
    #[serde(default)]
    pub smoother: Smoother,
}

impl SubspaceConfig {
    #[must_use]
    pub fn new(n_basis: usize) -> Self {
        Self {
            n_basis,
            smoother: Smoother::default(),
        }
    }

    #[must_use]
    pub fn with_smoother(mut self, smoother: Smoother) -> Self {
        self.smoother = smoother;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_basis == 0 {
            return Err(MultigridError::InvalidParameter(
                "a subspace needs at least one basis vector".into(),
            ));
        }
        self.smoother.validate()
    }
}

/// Block-orthonormal basis over the fine lattice of a blocking.
#[derive(Clone, Debug)]
pub struct Aggregation {
    blocking: Arc<Blocking>,
    site_dof: usize,
    basis: Vec<LatticeField>,
}

impl Aggregation {
    /// Random seeds, smoothed through `op`, then orthonormalised block by
    /// block.
    ///
    /// `op` must act on full fields of the blocking's fine lattice. Fails
    /// with `DegenerateBasis` if some block cannot hold `n_basis`
    /// independent vectors.
    pub fn create_subspace<H, R>(
        blocking: &Arc<Blocking>,
        op: &H,
        config: &SubspaceConfig,
        rng: &mut R,
    ) -> Result<Self>
    where
        H: HermitianOperator + ?Sized,
        R: Rng + ?Sized,
    {
        config.validate()?;
        let seed_domain = LatticeField::zeros(blocking.fine(), op.site_dof(), Checkerboard::Full)?;
        op.ensure_operands(&seed_domain, &seed_domain)?;

        let mut vectors = Vec::with_capacity(config.n_basis);
        for b in 0..config.n_basis {
            let mut v = LatticeField::gaussian(blocking.fine(), op.site_dof(), Checkerboard::Full, rng)?;
            normalize(&mut v)?;
            config.smoother.smooth(op, &mut v)?;
            debug!(vector = b, "smoothed subspace seed");
            vectors.push(v);
        }

        let aggregation = Self::from_vectors(blocking, vectors)?;
        info!(
            n_basis = config.n_basis,
            blocks = blocking.n_blocks(),
            coarse = ?blocking.coarse().dims(),
            "subspace created"
        );
        Ok(aggregation)
    }

    /// Orthonormalise the given full fields block by block.
    pub fn from_vectors(blocking: &Arc<Blocking>, mut vectors: Vec<LatticeField>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(MultigridError::InvalidParameter(
                "a subspace needs at least one basis vector".into(),
            ));
        };
        let site_dof = first.site_dof();
        for v in &vectors {
            v.ensure_domain(blocking.fine(), Checkerboard::Full, site_dof)?;
        }

        let blocks = (0..blocking.n_blocks())
            .into_par_iter()
            .map(|block| -> Result<Vec<Vec<Complex64>>> {
                let mut segments: Vec<Vec<Complex64>> = vectors
                    .iter()
                    .map(|v| gather(v, blocking.sites_in(block)))
                    .collect();
                orthonormalize(&mut segments, block)?;
                Ok(segments)
            })
            .collect::<Result<Vec<_>>>()?;

        for (block, segments) in blocks.iter().enumerate() {
            for (v, segment) in vectors.iter_mut().zip(segments) {
                scatter(v, blocking.sites_in(block), segment);
            }
        }

        Ok(Self {
            blocking: Arc::clone(blocking),
            site_dof,
            basis: vectors,
        })
    }

    #[must_use]
    pub fn blocking(&self) -> &Arc<Blocking> {
        &self.blocking
    }

    #[must_use]
    pub fn fine(&self) -> &Arc<Lattice> {
        self.blocking.fine()
    }

    #[must_use]
    pub fn coarse(&self) -> &Arc<Lattice> {
        self.blocking.coarse()
    }

    /// Components per fine site.
    #[must_use]
    pub const fn site_dof(&self) -> usize {
        self.site_dof
    }

    #[must_use]
    pub fn n_basis(&self) -> usize {
        self.basis.len()
    }

    #[must_use]
    pub fn basis(&self) -> &[LatticeField] {
        &self.basis
    }

    /// Restrict: fine full field → coarse full field with `n_basis`
    /// components per site.
    pub fn project(&self, fine: &LatticeField) -> Result<LatticeField> {
        fine.ensure_domain(self.fine(), Checkerboard::Full, self.site_dof)?;
        let nb = self.n_basis();
        let mut coarse = LatticeField::zeros(self.coarse(), nb, Checkerboard::Full)?;
        coarse
            .data_mut()
            .par_chunks_mut(nb)
            .enumerate()
            .for_each(|(block, out)| {
                for &site in self.blocking.sites_in(block) {
                    let v = fine.site(site);
                    for (o, phi) in out.iter_mut().zip(&self.basis) {
                        *o += site_dot(phi.site(site), v);
                    }
                }
            });
        Ok(coarse)
    }

    /// Prolong: coarse full field → fine full field.
    pub fn promote(&self, coarse: &LatticeField) -> Result<LatticeField> {
        coarse.ensure_domain(self.coarse(), Checkerboard::Full, self.n_basis())?;
        let mut fine = LatticeField::zeros(self.fine(), self.site_dof, Checkerboard::Full)?;
        fine.data_mut()
            .par_chunks_mut(self.site_dof)
            .enumerate()
            .for_each(|(site, out)| {
                let c = coarse.site(self.blocking.block_of(site));
                for (ci, phi) in c.iter().zip(&self.basis) {
                    for (o, p) in out.iter_mut().zip(phi.site(site)) {
                        *o += ci * p;
                    }
                }
            });
        Ok(fine)
    }

    /// max over blocks of |⟨φ_i, φ_j⟩_block − δ_ij|.
    #[must_use]
    pub fn orthonormality_defect(&self) -> f64 {
        (0..self.blocking.n_blocks())
            .into_par_iter()
            .map(|block| {
                let sites = self.blocking.sites_in(block);
                let mut worst = 0.0_f64;
                for (i, a) in self.basis.iter().enumerate() {
                    for (j, b) in self.basis.iter().enumerate() {
                        let g: Complex64 = sites
                            .iter()
                            .map(|&s| site_dot(a.site(s), b.site(s)))
                            .sum();
                        let delta = if i == j { 1.0 } else { 0.0 };
                        worst = worst.max((g - delta).norm());
                    }
                }
                worst
            })
            .reduce(|| 0.0, f64::max)
    }
}

#[inline]
fn site_dot(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

fn gather(v: &LatticeField, sites: &[usize]) -> Vec<Complex64> {
    sites.iter().flat_map(|&s| v.site(s).iter().copied()).collect()
}

fn scatter(v: &mut LatticeField, sites: &[usize], segment: &[Complex64]) {
    let n = v.site_dof();
    for (&s, chunk) in sites.iter().zip(segment.chunks_exact(n)) {
        v.site_mut(s).copy_from_slice(chunk);
    }
}

/// Classical Gram–Schmidt with one re-orthogonalisation pass.
fn orthonormalize(segments: &mut [Vec<Complex64>], block: usize) -> Result<()> {
    for k in 0..segments.len() {
        let (done, rest) = segments.split_at_mut(k);
        let v = &mut rest[0];
        let norm0 = norm(v);
        for _ in 0..2 {
            let coeffs: Vec<Complex64> = done.iter().map(|q| site_dot(q, v)).collect();
            for (q, c) in done.iter().zip(coeffs) {
                for (vi, qi) in v.iter_mut().zip(q) {
                    *vi -= c * qi;
                }
            }
        }
        let n = norm(v);
        if norm0 == 0.0 || n <= BASIS_DEGENERACY_REL * norm0 {
            return Err(MultigridError::DegenerateBasis { block, vector: k });
        }
        let inv = 1.0 / n;
        for vi in v.iter_mut() {
            *vi *= inv;
        }
    }
    Ok(())
}

fn norm(v: &[Complex64]) -> f64 {
    v.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerances::ORTHONORMALITY_ABS;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn blocking(fine: &[usize], coarse: &[usize]) -> Arc<Blocking> {
        let f = Arc::new(Lattice::new(fine).expect("fine"));
        let c = Arc::new(Lattice::new(coarse).expect("coarse"));
        Arc::new(Blocking::new(&f, &c).expect("blocking"))
    }

    fn random_vectors(b: &Blocking, n: usize, dof: usize, seed: u64) -> Vec<LatticeField> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| LatticeField::gaussian(b.fine(), dof, Checkerboard::Full, &mut rng).expect("v"))
            .collect()
    }

    #[test]
    fn basis_is_block_orthonormal() {
        let b = blocking(&[4, 4], &[2, 2]);
        let agg = Aggregation::from_vectors(&b, random_vectors(&b, 3, 2, 1)).expect("agg");
        assert_eq!(agg.n_basis(), 3);
        assert!(agg.orthonormality_defect() < ORTHONORMALITY_ABS);
    }

    #[test]
    fn restrict_after_prolong_is_identity() {
        let b = blocking(&[4, 2], &[2, 1]);
        let agg = Aggregation::from_vectors(&b, random_vectors(&b, 2, 3, 2)).expect("agg");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let c = LatticeField::gaussian(b.coarse(), 2, Checkerboard::Full, &mut rng).expect("c");
        let back = agg.project(&agg.promote(&c).expect("promote")).expect("project");
        let mut diff = c.zeros_like();
        diff.assign_sub(&back, &c).expect("sub");
        assert!(diff.norm() < 1e-12 * c.norm());
    }

    #[test]
    fn project_is_adjoint_of_promote() {
        let b = blocking(&[4, 4], &[2, 2]);
        let agg = Aggregation::from_vectors(&b, random_vectors(&b, 2, 2, 4)).expect("agg");
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let c = LatticeField::gaussian(b.coarse(), 2, Checkerboard::Full, &mut rng).expect("c");
        let f = LatticeField::gaussian(b.fine(), 2, Checkerboard::Full, &mut rng).expect("f");
        let lhs = f.dot(&agg.promote(&c).expect("promote")).expect("dot");
        let rhs = agg.project(&f).expect("project").dot(&c).expect("dot");
        assert!((lhs - rhs).norm() < 1e-10 * lhs.norm());
    }

    #[test]
    fn repeated_vector_is_degenerate() {
        let b = blocking(&[4, 4], &[2, 2]);
        let mut vectors = random_vectors(&b, 2, 2, 6);
        let copy = vectors[0].clone();
        vectors.push(copy);
        let err = Aggregation::from_vectors(&b, vectors).unwrap_err();
        assert!(matches!(err, MultigridError::DegenerateBasis { vector: 2, .. }));
    }

    #[test]
    fn too_many_vectors_for_block() {
        // 2 sites × 1 component per block: a third vector cannot be independent.
        let b = blocking(&[4], &[2]);
        let err = Aggregation::from_vectors(&b, random_vectors(&b, 3, 1, 7)).unwrap_err();
        assert!(matches!(err, MultigridError::DegenerateBasis { vector: 2, .. }));
    }

    #[test]
    fn wrong_lattice_rejected() {
        let b = blocking(&[4, 4], &[2, 2]);
        let other = Arc::new(Lattice::new(&[4, 2]).expect("other"));
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let v = LatticeField::gaussian(&other, 1, Checkerboard::Full, &mut rng).expect("v");
        assert!(matches!(
            Aggregation::from_vectors(&b, vec![v]),
            Err(MultigridError::IncompatibleOperand { .. })
        ));
    }

    #[test]
    fn config_defaults_smoother() {
        let cfg: SubspaceConfig = serde_json::from_str(r#"{"n_basis": 4}"#).expect("json");
        assert_eq!(cfg, SubspaceConfig::new(4));
        assert!(SubspaceConfig::new(0).validate().is_err());
    }
}
