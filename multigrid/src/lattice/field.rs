// SPDX-License-Identifier: AGPL-3.0-only

//! Complex lattice fields: `site_dof` components per site.
//!
//! A field lives either on the whole lattice or on one parity class
//! (a half-size "checkerboarded" field). It carries an `Arc` to its lattice
//! so every binary operation can reject operands of a different shape
//! before touching data.
//!
//! Storage is site-major: component `c` of the `i`-th site of the subset is
//! `data[i * site_dof + c]`.
//!
//! Inner products reduce locally on rayon workers and then through the
//! lattice's [`Communicator`](super::Communicator), so every rank sees the
//! same scalar.

use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use super::geometry::{Checkerboard, Lattice, Parity};
use crate::error::{FieldShape, MultigridError, Result};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Complex vector over (a checkerboard of) a lattice.
#[derive(Clone, Debug)]
pub struct LatticeField {
    lattice: Arc<Lattice>,
    checkerboard: Checkerboard,
    site_dof: usize,
    data: Vec<Complex64>,
}

impl LatticeField {
    /// Zero field.
    ///
    /// Half-lattice fields need a checkerboardable lattice.
    pub fn zeros(lattice: &Arc<Lattice>, site_dof: usize, checkerboard: Checkerboard) -> Result<Self> {
        if site_dof == 0 {
            return Err(MultigridError::InvalidParameter(
                "fields need at least one component per site".into(),
            ));
        }
        if checkerboard != Checkerboard::Full && !lattice.is_checkerboardable() {
            return Err(MultigridError::InvalidGeometry(format!(
                "{:?} has an odd extent and cannot be checkerboarded",
                lattice.dims()
            )));
        }
        let len = lattice.n_sites(checkerboard) * site_dof;
        Ok(Self {
            lattice: Arc::clone(lattice),
            checkerboard,
            site_dof,
            data: vec![ZERO; len],
        })
    }

    /// Zero field of the same shape.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self {
            lattice: Arc::clone(&self.lattice),
            checkerboard: self.checkerboard,
            site_dof: self.site_dof,
            data: vec![ZERO; self.data.len()],
        }
    }

    /// Field of independent complex Gaussian deviates, real and imaginary
    /// parts each N(0, 1).
    pub fn gaussian<R: Rng + ?Sized>(
        lattice: &Arc<Lattice>,
        site_dof: usize,
        checkerboard: Checkerboard,
        rng: &mut R,
    ) -> Result<Self> {
        let mut field = Self::zeros(lattice, site_dof, checkerboard)?;
        for z in &mut field.data {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            *z = Complex64::new(re, im);
        }
        Ok(field)
    }

    /// Wrap existing site-major data.
    pub fn from_data(
        lattice: &Arc<Lattice>,
        site_dof: usize,
        checkerboard: Checkerboard,
        data: Vec<Complex64>,
    ) -> Result<Self> {
        let mut field = Self::zeros(lattice, site_dof, checkerboard)?;
        if data.len() != field.data.len() {
            return Err(MultigridError::InvalidParameter(format!(
                "expected {} components, got {}",
                field.data.len(),
                data.len()
            )));
        }
        field.data = data;
        Ok(field)
    }

    #[must_use]
    pub fn lattice(&self) -> &Arc<Lattice> {
        &self.lattice
    }

    #[must_use]
    pub const fn checkerboard(&self) -> Checkerboard {
        self.checkerboard
    }

    #[must_use]
    pub const fn site_dof(&self) -> usize {
        self.site_dof
    }

    /// Number of sites in this field's subset.
    #[must_use]
    pub fn n_sites(&self) -> usize {
        self.data.len() / self.site_dof
    }

    /// Total number of complex components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    /// Components of the `i`-th site of the subset.
    #[must_use]
    pub fn site(&self, i: usize) -> &[Complex64] {
        &self.data[i * self.site_dof..(i + 1) * self.site_dof]
    }

    pub fn site_mut(&mut self, i: usize) -> &mut [Complex64] {
        let n = self.site_dof;
        &mut self.data[i * n..(i + 1) * n]
    }

    /// Lattice dims, checkerboard and site width.
    #[must_use]
    pub fn shape(&self) -> FieldShape {
        FieldShape {
            dims: self.lattice.dims().to_vec(),
            checkerboard: self.checkerboard,
            site_dof: self.site_dof,
        }
    }

    /// Fail with `IncompatibleOperand` unless the field lives on the given
    /// domain.
    pub fn ensure_domain(
        &self,
        lattice: &Lattice,
        checkerboard: Checkerboard,
        site_dof: usize,
    ) -> Result<()> {
        if self.lattice.same_geometry(lattice)
            && self.checkerboard == checkerboard
            && self.site_dof == site_dof
        {
            Ok(())
        } else {
            Err(MultigridError::incompatible(
                FieldShape {
                    dims: lattice.dims().to_vec(),
                    checkerboard,
                    site_dof,
                },
                self.shape(),
            ))
        }
    }

    /// Fail with `IncompatibleOperand` unless `other` has this field's shape.
    pub fn ensure_conforms(&self, other: &Self) -> Result<()> {
        other.ensure_domain(&self.lattice, self.checkerboard, self.site_dof)
    }

    /// Inner product ⟨self, other⟩ = Σ conj(self)·other (collective).
    pub fn dot(&self, other: &Self) -> Result<Complex64> {
        self.ensure_conforms(other)?;
        let local: Complex64 = self
            .data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(a, b)| a.conj() * b)
            .sum();
        Ok(self.lattice.comm().sum_complex(local))
    }

    /// ‖self‖² (collective).
    #[must_use]
    pub fn norm_sq(&self) -> f64 {
        let local: f64 = self.data.par_iter().map(|z| z.norm_sqr()).sum();
        self.lattice.comm().sum_f64(local)
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// self += a·x
    pub fn axpy(&mut self, a: Complex64, x: &Self) -> Result<()> {
        self.ensure_conforms(x)?;
        self.data
            .par_iter_mut()
            .zip(x.data.par_iter())
            .for_each(|(s, xi)| *s += a * xi);
        Ok(())
    }

    /// self += a·x for real a.
    pub fn axpy_real(&mut self, a: f64, x: &Self) -> Result<()> {
        self.axpy(Complex64::new(a, 0.0), x)
    }

    /// self = x + a·self
    pub fn xpay(&mut self, a: Complex64, x: &Self) -> Result<()> {
        self.ensure_conforms(x)?;
        self.data
            .par_iter_mut()
            .zip(x.data.par_iter())
            .for_each(|(s, xi)| *s = xi + a * *s);
        Ok(())
    }

    /// self = a − b
    pub fn assign_sub(&mut self, a: &Self, b: &Self) -> Result<()> {
        self.ensure_conforms(a)?;
        self.ensure_conforms(b)?;
        self.data
            .par_iter_mut()
            .zip(a.data.par_iter().zip(b.data.par_iter()))
            .for_each(|(s, (ai, bi))| *s = ai - bi);
        Ok(())
    }

    /// self *= a
    pub fn scale(&mut self, a: f64) {
        self.data.par_iter_mut().for_each(|z| *z *= a);
    }

    /// self *= a for complex a.
    pub fn scale_complex(&mut self, a: Complex64) {
        self.data.par_iter_mut().for_each(|z| *z *= a);
    }

    pub fn set_zero(&mut self) {
        self.data.par_iter_mut().for_each(|z| *z = ZERO);
    }

    pub fn copy_from(&mut self, other: &Self) -> Result<()> {
        self.ensure_conforms(other)?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Half-lattice field holding this full field's sites of one parity.
    pub fn pick_checkerboard(&self, parity: Parity) -> Result<Self> {
        self.ensure_domain(&self.lattice, Checkerboard::Full, self.site_dof)?;
        let cb = Checkerboard::from(parity);
        let mut half = Self::zeros(&self.lattice, self.site_dof, cb)?;
        let n = self.site_dof;
        let sites = self.lattice.cb_sites(parity);
        half.data
            .par_chunks_mut(n)
            .zip(sites.par_iter())
            .for_each(|(dst, &site)| dst.copy_from_slice(&self.data[site * n..(site + 1) * n]));
        Ok(half)
    }

    /// Overwrite this full field's sites of `half`'s parity with `half`.
    pub fn set_checkerboard(&mut self, half: &Self) -> Result<()> {
        self.ensure_domain(&self.lattice, Checkerboard::Full, self.site_dof)?;
        let Some(parity) = half.checkerboard.parity() else {
            return Err(MultigridError::incompatible(
                FieldShape {
                    dims: self.lattice.dims().to_vec(),
                    checkerboard: Checkerboard::Even,
                    site_dof: self.site_dof,
                },
                half.shape(),
            ));
        };
        half.ensure_domain(&self.lattice, half.checkerboard, self.site_dof)?;
        let n = self.site_dof;
        for (i, &site) in self.lattice.cb_sites(parity).iter().enumerate() {
            self.data[site * n..(site + 1) * n].copy_from_slice(&half.data[i * n..(i + 1) * n]);
        }
        Ok(())
    }
}
