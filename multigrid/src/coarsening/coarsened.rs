// SPDX-License-Identifier: AGPL-3.0-only

//! Nearest-neighbour operator with dense site blocks.
//!
//! Per site `x` there are `2·n_dims + 1` stencil points: one hop link per
//! `(μ, ±)` and the self link, last. With `A_p(x)` the `n × n` link,
//!
//! ```text
//! (M v)(x)  = A_self(x) v(x)  + Σ_{μ,±} A_{μ±}(x) v(x ± μ)
//! (M† v)(x) = A_self(x)† v(x) + Σ_{μ,±} A_{μ±}(x ∓ μ)† v(x ∓ μ)
//! ```
//!
//! This is the shape of a Galerkin-coarsened operator
//! ([`CoarsenedMatrix::coarsen_operator`]). It implements [`SparseMatrix`],
//! so the result of one coarsening can be wrapped, solved with, and
//! coarsened again.
//!
//! Self links never couple parities and hop links always do (on a
//! checkerboardable lattice), which gives the parity blocks directly:
//! `Mooee = A_self`, `Meooe = Σ hops`.

use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use super::aggregation::Aggregation;
use super::dense::DenseMatrix;
use crate::error::{FieldShape, MultigridError, Result};
use crate::lattice::{Blocking, Checkerboard, Direction, Lattice, LatticeField};
use crate::operator::{LinearOperator, SparseMatrix, SCHUR_PARITY};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Stencil point of the hop along `dir·mu`.
#[inline]
#[must_use]
pub const fn stencil_point(mu: usize, dir: Direction) -> usize {
    2 * mu + dir.index()
}

/// Dense-block nearest-neighbour matrix on a lattice.
#[derive(Clone, Debug)]
pub struct CoarsenedMatrix {
    lattice: Arc<Lattice>,
    dof: usize,
    n_points: usize,
    /// `links[site * n_points + point]`
    links: Vec<DenseMatrix>,
    /// Inverse of each self link, `None` where singular.
    self_inv: Vec<Option<DenseMatrix>>,
}

impl CoarsenedMatrix {
    /// All links zero.
    pub fn zeros(lattice: &Arc<Lattice>, dof: usize) -> Result<Self> {
        if dof == 0 {
            return Err(MultigridError::InvalidParameter(
                "coarse operator needs at least one component per site".into(),
            ));
        }
        let n_points = 2 * lattice.n_dims() + 1;
        Ok(Self {
            lattice: Arc::clone(lattice),
            dof,
            n_points,
            links: vec![DenseMatrix::zeros(dof); lattice.volume() * n_points],
            self_inv: vec![None; lattice.volume()],
        })
    }

    /// Random links with entries uniform in `[−hop_scale, hop_scale]` and
    /// `shift` added to the self-link diagonal.
    ///
    /// Invertible (and well conditioned) when `shift` dominates the sum of
    /// link entries in a row.
    pub fn random<R: Rng + ?Sized>(
        lattice: &Arc<Lattice>,
        dof: usize,
        shift: f64,
        hop_scale: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let mut m = Self::zeros(lattice, dof)?;
        let self_point = m.self_point();
        for (i, link) in m.links.iter_mut().enumerate() {
            *link = DenseMatrix::random(dof, hop_scale, rng);
            if i % m.n_points == self_point {
                for d in 0..dof {
                    link.add(d, d, Complex64::new(shift, 0.0));
                }
            }
        }
        m.refresh_inverses();
        Ok(m)
    }

    /// Random Hermitian matrix: self links `diag(masses) + (G + G†)/2`,
    /// backward hops the adjoints of the matching forward hops.
    ///
    /// Indefinite when `masses` has both signs and `hop_scale` is small
    /// against them.
    pub fn random_hermitian<R: Rng + ?Sized>(
        lattice: &Arc<Lattice>,
        masses: &[f64],
        hop_scale: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let dof = masses.len();
        let mut m = Self::zeros(lattice, dof)?;
        let self_point = m.self_point();
        for site in 0..lattice.volume() {
            let g = DenseMatrix::random(dof, 0.5 * hop_scale, rng);
            let mut link = g.plus(&g.adjoint());
            for (d, &mass) in masses.iter().enumerate() {
                link.add(d, d, Complex64::new(mass, 0.0));
            }
            m.links[site * m.n_points + self_point] = link;

            for mu in 0..lattice.n_dims() {
                let hop = DenseMatrix::random(dof, hop_scale, rng);
                let up = lattice.neighbor(site, mu, Direction::Forward);
                m.links[up * m.n_points + stencil_point(mu, Direction::Backward)] = hop.adjoint();
                m.links[site * m.n_points + stencil_point(mu, Direction::Forward)] = hop;
            }
        }
        m.refresh_inverses();
        Ok(m)
    }

    /// Galerkin projection `R · op · P` onto the span of `aggregates`.
    ///
    /// Each fine hop is attributed to the coarse self link when it stays
    /// inside a block and to the coarse hop link in the same direction when
    /// it crosses a block face.
    ///
    /// `op` must expose its site-local and one-hop parts (`op_diag`,
    /// `op_dir`). Only the full-lattice nearest-neighbour wrappers do:
    /// [`NonHermitianLinearOperator`](crate::operator::NonHermitianLinearOperator)
    /// and [`SelfAdjointLinearOperator`](crate::operator::SelfAdjointLinearOperator).
    /// The normal wrappers reach next-nearest neighbours and fail with
    /// `UnsupportedAction`; the checkerboard wrappers act on one parity and
    /// fail with `IncompatibleOperand`.
    pub fn coarsen_operator<L: LinearOperator + ?Sized>(
        op: &L,
        aggregates: &Aggregation,
    ) -> Result<Self> {
        let blocking = aggregates.blocking();
        let domain = op.new_field()?;
        domain.ensure_domain(aggregates.fine(), Checkerboard::Full, aggregates.site_dof())?;

        let mut coarse = Self::zeros(aggregates.coarse(), aggregates.n_basis())?;
        let self_point = coarse.self_point();
        let mut interior = op.new_field()?;
        let mut exterior = op.new_field()?;

        for (j, phi) in aggregates.basis().iter().enumerate() {
            op.op_diag(phi, &mut interior)?;
            coarse.add_column(self_point, j, &aggregates.project(&interior)?);

            for mu in 0..blocking.fine().n_dims() {
                for dir in Direction::ALL {
                    op.op_dir(phi, &mut interior, mu, dir)?;
                    split_faces(blocking, &mut interior, &mut exterior, mu, dir);
                    coarse.add_column(self_point, j, &aggregates.project(&interior)?);
                    coarse.add_column(stencil_point(mu, dir), j, &aggregates.project(&exterior)?);
                }
            }
            debug!(vector = j, "coarsened basis vector");
        }

        coarse.refresh_inverses();
        info!(
            fine = ?blocking.fine().dims(),
            coarse = ?blocking.coarse().dims(),
            n_basis = aggregates.n_basis(),
            "coarse operator assembled"
        );
        Ok(coarse)
    }

    #[must_use]
    pub const fn n_points(&self) -> usize {
        self.n_points
    }

    #[must_use]
    pub const fn self_point(&self) -> usize {
        self.n_points - 1
    }

    #[must_use]
    pub fn link(&self, site: usize, point: usize) -> &DenseMatrix {
        &self.links[site * self.n_points + point]
    }

    /// Replace one link.
    ///
    /// # Panics
    ///
    /// If `matrix` is not `site_dof × site_dof` or the indices are out of
    /// range.
    pub fn set_link(&mut self, site: usize, point: usize, matrix: DenseMatrix) {
        assert_eq!(matrix.dim(), self.dof, "link dimension mismatch");
        assert!(point < self.n_points, "stencil point out of range");
        if point == self.self_point() {
            self.self_inv[site] = matrix.inverse();
        }
        self.links[site * self.n_points + point] = matrix;
    }

    /// Whether every self link is invertible (the checkerboard actions
    /// need this).
    #[must_use]
    pub fn has_invertible_diagonal(&self) -> bool {
        self.self_inv.iter().all(Option::is_some)
    }

    fn refresh_inverses(&mut self) {
        let n_points = self.n_points;
        let self_point = self.self_point();
        let links = &self.links;
        self.self_inv
            .par_iter_mut()
            .enumerate()
            .for_each(|(site, inv)| *inv = links[site * n_points + self_point].inverse());
    }

    /// `links(·, point)[:, col] += coarse(·)`
    fn add_column(&mut self, point: usize, col: usize, coarse: &LatticeField) {
        self.links
            .par_chunks_mut(self.n_points)
            .enumerate()
            .for_each(|(site, links)| {
                for (row, v) in coarse.site(site).iter().enumerate() {
                    links[point].add(row, col, *v);
                }
            });
    }

    fn full_operands(&self, input: &LatticeField, out: &LatticeField) -> Result<()> {
        input.ensure_domain(&self.lattice, Checkerboard::Full, self.dof)?;
        out.ensure_domain(&self.lattice, Checkerboard::Full, self.dof)
    }

    /// Half-lattice operands; `out` on the opposite parity for hops, the
    /// same parity otherwise.
    fn parity_operands(&self, input: &LatticeField, out: &LatticeField, hop: bool) -> Result<()> {
        let Some(parity) = input.checkerboard().parity() else {
            return Err(MultigridError::incompatible(
                FieldShape {
                    dims: self.lattice.dims().to_vec(),
                    checkerboard: Checkerboard::from(SCHUR_PARITY),
                    site_dof: self.dof,
                },
                input.shape(),
            ));
        };
        input.ensure_domain(&self.lattice, input.checkerboard(), self.dof)?;
        let out_parity = if hop { parity.opposite() } else { parity };
        out.ensure_domain(&self.lattice, Checkerboard::from(out_parity), self.dof)
    }

    /// Fill every output site with `kernel(site, dst)`; `dst` starts zeroed.
    fn apply<F>(&self, out: &mut LatticeField, kernel: F)
    where
        F: Fn(usize, &mut [Complex64]) + Sync,
    {
        let lattice = &self.lattice;
        let cb = out.checkerboard();
        out.data_mut()
            .par_chunks_mut(self.dof)
            .enumerate()
            .for_each(|(i, dst)| {
                dst.fill(ZERO);
                kernel(lattice.subset_site(cb, i), dst);
            });
    }

    /// [`apply`](Self::apply) that also returns ‖out‖², summed in the same
    /// sweep (collective).
    fn apply_and_norm<F>(&self, out: &mut LatticeField, kernel: F) -> f64
    where
        F: Fn(usize, &mut [Complex64]) + Sync,
    {
        let lattice = &self.lattice;
        let cb = out.checkerboard();
        let local: f64 = out
            .data_mut()
            .par_chunks_mut(self.dof)
            .enumerate()
            .map(|(i, dst)| {
                dst.fill(ZERO);
                kernel(lattice.subset_site(cb, i), dst);
                dst.iter().map(Complex64::norm_sqr).sum::<f64>()
            })
            .sum();
        lattice.comm().sum_f64(local)
    }

    /// (M v)(x) for a full-lattice `v`.
    fn forward_site(&self, input: &LatticeField, x: usize, dst: &mut [Complex64]) {
        self.link(x, self.self_point()).mul_vec_acc(input.site(x), dst);
        self.hop_terms(input, x, dst);
    }

    /// (M† v)(x) for a full-lattice `v`.
    fn adjoint_site(&self, input: &LatticeField, x: usize, dst: &mut [Complex64]) {
        self.link(x, self.self_point()).adj_mul_vec_acc(input.site(x), dst);
        self.hop_terms_dag(input, x, dst);
    }

    /// Σ_{μ,±} A_{μ±}(x) v(x ± μ)
    fn hop_terms(&self, input: &LatticeField, x: usize, dst: &mut [Complex64]) {
        for mu in 0..self.lattice.n_dims() {
            for dir in Direction::ALL {
                let y = self.lattice.neighbor(x, mu, dir);
                self.link(x, stencil_point(mu, dir))
                    .mul_vec_acc(site_of(input, y), dst);
            }
        }
    }

    /// Σ_{μ,±} A_{μ±}(x ∓ μ)† v(x ∓ μ)
    fn hop_terms_dag(&self, input: &LatticeField, x: usize, dst: &mut [Complex64]) {
        for mu in 0..self.lattice.n_dims() {
            for dir in Direction::ALL {
                let y = self.lattice.neighbor(x, mu, dir.reverse());
                self.link(y, stencil_point(mu, dir))
                    .adj_mul_vec_acc(site_of(input, y), dst);
            }
        }
    }

    fn apply_inverse(&self, input: &LatticeField, out: &mut LatticeField, adjoint: bool) -> Result<()> {
        self.parity_operands(input, out, false)?;
        let lattice = &self.lattice;
        let cb = out.checkerboard();
        out.data_mut()
            .par_chunks_mut(self.dof)
            .enumerate()
            .try_for_each(|(i, dst)| -> Result<()> {
                let x = lattice.subset_site(cb, i);
                let inv = self.self_inv[x]
                    .as_ref()
                    .ok_or(MultigridError::SingularSiteMatrix { site: x })?;
                dst.fill(ZERO);
                if adjoint {
                    inv.adj_mul_vec_acc(site_of(input, x), dst);
                } else {
                    inv.mul_vec_acc(site_of(input, x), dst);
                }
                Ok(())
            })
    }
}

/// Components of `field` at full-lattice site `site` (which must belong to
/// the field's subset).
#[inline]
fn site_of(field: &LatticeField, site: usize) -> &[Complex64] {
    field.site(field.lattice().subset_index(field.checkerboard(), site))
}

/// Move the part of `interior` sitting on block faces (for hops along
/// `dir·mu`) into `exterior`.
fn split_faces(
    blocking: &Blocking,
    interior: &mut LatticeField,
    exterior: &mut LatticeField,
    mu: usize,
    dir: Direction,
) {
    let n = interior.site_dof();
    interior
        .data_mut()
        .par_chunks_mut(n)
        .zip(exterior.data_mut().par_chunks_mut(n))
        .enumerate()
        .for_each(|(site, (inner, outer))| {
            if blocking.is_block_face(site, mu, dir) {
                outer.copy_from_slice(inner);
                inner.fill(ZERO);
            } else {
                outer.fill(ZERO);
            }
        });
}

impl SparseMatrix for CoarsenedMatrix {
    fn lattice(&self) -> &Arc<Lattice> {
        &self.lattice
    }

    fn site_dof(&self) -> usize {
        self.dof
    }

    fn m(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.full_operands(input, out)?;
        self.apply(out, |x, dst| self.forward_site(input, x, dst));
        Ok(())
    }

    fn m_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.full_operands(input, out)?;
        Ok(self.apply_and_norm(out, |x, dst| self.forward_site(input, x, dst)))
    }

    fn m_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.full_operands(input, out)?;
        self.apply(out, |x, dst| self.adjoint_site(input, x, dst));
        Ok(())
    }

    fn m_dag_m(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.full_operands(input, out)?;
        let mut tmp = input.zeros_like();
        self.m(input, &mut tmp)?;
        Ok(self.apply_and_norm(out, |x, dst| self.adjoint_site(&tmp, x, dst)))
    }

    /// `Mpc† (Mpc in)`, with the last step of `Mpc†` fused into the norm
    /// sweep: `out(x) = A_self(x)† t(x) − Σ hops† (Mee⁻† Moe† t)`.
    fn mpc_dag_mpc(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        out.ensure_domain(&self.lattice, Checkerboard::from(SCHUR_PARITY), self.dof)?;
        let mut tmp = input.zeros_like();
        self.mpc(input, &mut tmp)?;

        let mut even = LatticeField::zeros(
            &self.lattice,
            self.dof,
            Checkerboard::from(SCHUR_PARITY.opposite()),
        )?;
        self.meooe_dag(&tmp, &mut even)?;
        let mut even_inv = even.zeros_like();
        self.mooee_inv_dag(&even, &mut even_inv)?;

        let self_point = self.self_point();
        Ok(self.apply_and_norm(out, |x, dst| {
            self.hop_terms_dag(&even_inv, x, dst);
            dst.iter_mut().for_each(|z| *z = -*z);
            self.link(x, self_point).adj_mul_vec_acc(site_of(&tmp, x), dst);
        }))
    }

    fn m_diag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.full_operands(input, out)?;
        let self_point = self.self_point();
        self.apply(out, |x, dst| {
            self.link(x, self_point).mul_vec_acc(input.site(x), dst);
        });
        Ok(())
    }

    fn m_dir(
        &self,
        input: &LatticeField,
        out: &mut LatticeField,
        mu: usize,
        dir: Direction,
    ) -> Result<()> {
        self.full_operands(input, out)?;
        if mu >= self.lattice.n_dims() {
            return Err(MultigridError::InvalidParameter(format!(
                "direction {mu} out of range for a {}-dimensional lattice",
                self.lattice.n_dims()
            )));
        }
        let point = stencil_point(mu, dir);
        self.apply(out, |x, dst| {
            let y = self.lattice.neighbor(x, mu, dir);
            self.link(x, point).mul_vec_acc(input.site(y), dst);
        });
        Ok(())
    }

    fn meooe(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.parity_operands(input, out, true)?;
        self.apply(out, |x, dst| self.hop_terms(input, x, dst));
        Ok(())
    }

    fn meooe_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.parity_operands(input, out, true)?;
        self.apply(out, |x, dst| self.hop_terms_dag(input, x, dst));
        Ok(())
    }

    fn mooee(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.parity_operands(input, out, false)?;
        let self_point = self.self_point();
        self.apply(out, |x, dst| {
            self.link(x, self_point).mul_vec_acc(site_of(input, x), dst);
        });
        Ok(())
    }

    fn mooee_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.parity_operands(input, out, false)?;
        let self_point = self.self_point();
        self.apply(out, |x, dst| {
            self.link(x, self_point).adj_mul_vec_acc(site_of(input, x), dst);
        });
        Ok(())
    }

    fn mooee_inv(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.apply_inverse(input, out, false)
    }

    fn mooee_inv_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.apply_inverse(input, out, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Parity;
    use crate::operator::{checks, NonHermitianLinearOperator, SelfAdjointLinearOperator};
    use crate::tolerances::{CHECKERBOARD_ABS, HERMITICITY_REL};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn lattice(dims: &[usize]) -> Arc<Lattice> {
        Arc::new(Lattice::new(dims).expect("lattice"))
    }

    fn distance(a: &LatticeField, b: &LatticeField) -> f64 {
        let mut d = a.zeros_like();
        d.assign_sub(a, b).expect("sub");
        d.norm()
    }

    #[test]
    fn directional_parts_sum_to_operator() {
        let lat = lattice(&[4, 2, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let m = CoarsenedMatrix::random(&lat, 2, 2.0, 0.5, &mut rng).expect("m");
        let v = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("v");

        let mut full = v.zeros_like();
        m.m(&v, &mut full).expect("m");

        let mut sum = v.zeros_like();
        m.m_diag(&v, &mut sum).expect("diag");
        let mut part = v.zeros_like();
        for mu in 0..3 {
            for dir in Direction::ALL {
                m.m_dir(&v, &mut part, mu, dir).expect("dir");
                sum.axpy_real(1.0, &part).expect("axpy");
            }
        }
        assert!(distance(&full, &sum) < 1e-12 * full.norm());
    }

    #[test]
    fn adjoint_matches_forward() {
        let lat = lattice(&[4, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let m = CoarsenedMatrix::random(&lat, 3, 1.0, 1.0, &mut rng).expect("m");
        let x = LatticeField::gaussian(&lat, 3, Checkerboard::Full, &mut rng).expect("x");
        let y = LatticeField::gaussian(&lat, 3, Checkerboard::Full, &mut rng).expect("y");
        let op = NonHermitianLinearOperator::new(&m);
        assert!(checks::adjoint_defect(&op, &x, &y).expect("defect") < HERMITICITY_REL);
    }

    #[test]
    fn random_hermitian_is_hermitian() {
        // Extent 2 and extent 1 directions fold forward and backward hops
        // onto the same neighbour.
        for dims in [[4usize, 4], [2, 4], [1, 4]] {
            let lat = lattice(&dims);
            let mut rng = ChaCha8Rng::seed_from_u64(33);
            let m = CoarsenedMatrix::random_hermitian(&lat, &[1.0, -1.0], 0.2, &mut rng)
                .expect("m");
            let x = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("x");
            let y = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("y");

            let mut mx = x.zeros_like();
            let mut mdx = x.zeros_like();
            m.m(&x, &mut mx).expect("m");
            m.m_dag(&x, &mut mdx).expect("mdag");
            assert!(distance(&mx, &mdx) < 1e-12 * mx.norm());

            let op = SelfAdjointLinearOperator::new(&m);
            assert!(checks::adjoint_defect(&op, &x, &y).expect("defect") < HERMITICITY_REL);
        }
    }

    #[test]
    fn parity_blocks_reassemble_full_operator() {
        let lat = lattice(&[4, 4]);
        let mut rng = ChaCha8Rng::seed_from_u64(34);
        let m = CoarsenedMatrix::random(&lat, 2, 3.0, 0.4, &mut rng).expect("m");
        let v = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("v");
        let mut full = v.zeros_like();
        m.m(&v, &mut full).expect("m");

        let mut rebuilt = v.zeros_like();
        for parity in [Parity::Even, Parity::Odd] {
            let same = v.pick_checkerboard(parity).expect("same");
            let other = v.pick_checkerboard(parity.opposite()).expect("other");
            let mut diag = same.zeros_like();
            let mut hop = same.zeros_like();
            m.mooee(&same, &mut diag).expect("mooee");
            m.meooe(&other, &mut hop).expect("meooe");
            diag.axpy_real(1.0, &hop).expect("axpy");
            rebuilt.set_checkerboard(&diag).expect("set");
        }
        assert!(distance(&full, &rebuilt) < CHECKERBOARD_ABS * full.norm().max(1.0));
    }

    #[test]
    fn schur_complement_solves_odd_system() {
        // With x_e = −Mee⁻¹ Meo x_o, the even rows of M x vanish and the odd
        // rows equal Mpc x_o.
        let lat = lattice(&[4, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(35);
        let m = CoarsenedMatrix::random(&lat, 2, 3.0, 0.4, &mut rng).expect("m");
        assert!(m.has_invertible_diagonal());
        let x_o = LatticeField::gaussian(&lat, 2, Checkerboard::Odd, &mut rng).expect("x_o");

        let mut t = LatticeField::zeros(&lat, 2, Checkerboard::Even).expect("t");
        m.meooe(&x_o, &mut t).expect("meooe");
        let mut x_e = t.zeros_like();
        m.mooee_inv(&t, &mut x_e).expect("inv");
        x_e.scale(-1.0);

        let mut x = LatticeField::zeros(&lat, 2, Checkerboard::Full).expect("x");
        x.set_checkerboard(&x_e).expect("even");
        x.set_checkerboard(&x_o).expect("odd");
        let mut mx = x.zeros_like();
        m.m(&x, &mut mx).expect("m");

        let mut mpc = x_o.zeros_like();
        m.mpc(&x_o, &mut mpc).expect("mpc");
        let even = mx.pick_checkerboard(Parity::Even).expect("even");
        let odd = mx.pick_checkerboard(Parity::Odd).expect("odd");
        assert!(even.norm() < 1e-12 * x.norm());
        assert!(distance(&odd, &mpc) < 1e-12 * mpc.norm());
    }

    #[test]
    fn schur_adjoint_pairs_with_schur() {
        let lat = lattice(&[4, 4]);
        let mut rng = ChaCha8Rng::seed_from_u64(36);
        let m = CoarsenedMatrix::random(&lat, 2, 3.0, 0.4, &mut rng).expect("m");
        let x = LatticeField::gaussian(&lat, 2, Checkerboard::Odd, &mut rng).expect("x");
        let y = LatticeField::gaussian(&lat, 2, Checkerboard::Odd, &mut rng).expect("y");
        let op = crate::operator::NonHermitianCheckerboardOperator::new(&m);
        assert!(checks::adjoint_defect(&op, &x, &y).expect("defect") < HERMITICITY_REL);
    }

    #[test]
    fn singular_self_link_surfaces_from_schur_only() {
        let lat = lattice(&[2, 2]);
        let m = CoarsenedMatrix::zeros(&lat, 1).expect("m");
        assert!(!m.has_invertible_diagonal());
        let x = LatticeField::zeros(&lat, 1, Checkerboard::Odd).expect("x");
        let mut y = x.zeros_like();
        assert!(matches!(
            m.mpc(&x, &mut y),
            Err(MultigridError::SingularSiteMatrix { .. })
        ));

        let f = LatticeField::zeros(&lat, 1, Checkerboard::Full).expect("f");
        let mut g = f.zeros_like();
        assert!(m.m(&f, &mut g).is_ok());
    }

    #[test]
    fn fused_normal_actions_match_composition() {
        let lat = lattice(&[4, 4]);
        let mut rng = ChaCha8Rng::seed_from_u64(38);
        let m = CoarsenedMatrix::random(&lat, 2, 3.0, 0.4, &mut rng).expect("m");

        let v = LatticeField::gaussian(&lat, 2, Checkerboard::Full, &mut rng).expect("v");
        let mut mv = v.zeros_like();
        m.m(&v, &mut mv).expect("m");
        let mut composed = v.zeros_like();
        m.m_dag(&mv, &mut composed).expect("m_dag");

        let mut fused = v.zeros_like();
        let n2 = m.m_dag_m(&v, &mut fused).expect("m_dag_m");
        assert!(distance(&fused, &composed) < 1e-12 * composed.norm());
        assert!((n2 - fused.norm_sq()).abs() <= 1e-12 * n2);

        let mut forward = v.zeros_like();
        let n2 = m.m_and_norm(&v, &mut forward).expect("m_and_norm");
        assert!(distance(&forward, &mv) == 0.0);
        assert!((n2 - mv.norm_sq()).abs() <= 1e-12 * n2);

        let w = LatticeField::gaussian(&lat, 2, Checkerboard::Odd, &mut rng).expect("w");
        let mut mw = w.zeros_like();
        m.mpc(&w, &mut mw).expect("mpc");
        let mut composed = w.zeros_like();
        m.mpc_dag(&mw, &mut composed).expect("mpc_dag");

        let mut fused = w.zeros_like();
        let n2 = m.mpc_dag_mpc(&w, &mut fused).expect("mpc_dag_mpc");
        assert!(distance(&fused, &composed) < 1e-12 * composed.norm());
        assert!((n2 - fused.norm_sq()).abs() <= 1e-12 * n2);

        let mut even_out = LatticeField::zeros(&lat, 2, Checkerboard::Even).expect("even");
        assert!(matches!(
            m.mpc_dag_mpc(&w, &mut even_out),
            Err(MultigridError::IncompatibleOperand { .. })
        ));
    }

    #[test]
    fn parity_mismatch_rejected() {
        let lat = lattice(&[2, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(37);
        let m = CoarsenedMatrix::random(&lat, 1, 2.0, 0.1, &mut rng).expect("m");
        let even = LatticeField::zeros(&lat, 1, Checkerboard::Even).expect("even");
        let mut also_even = even.zeros_like();
        assert!(matches!(
            m.meooe(&even, &mut also_even),
            Err(MultigridError::IncompatibleOperand { .. })
        ));
        let full = LatticeField::zeros(&lat, 1, Checkerboard::Full).expect("full");
        assert!(matches!(
            m.mooee(&full, &mut also_even),
            Err(MultigridError::IncompatibleOperand { .. })
        ));
    }
}
