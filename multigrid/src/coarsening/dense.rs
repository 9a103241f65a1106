// SPDX-License-Identifier: AGPL-3.0-only

//! Small dense complex matrices: the per-site coupling blocks of a coarse
//! operator.
//!
//! Row-major `n × n`; sizes are the number of basis vectors per block, so
//! everything here is O(n²) or O(n³) with tiny n.

use num_complex::Complex64;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tolerances::PIVOT_GUARD_REL;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Square complex matrix, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<Complex64>,
}

impl DenseMatrix {
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![ZERO; n * n],
        }
    }

    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.data[i * n + i] = ONE;
        }
        m
    }

    /// Entries with real and imaginary parts uniform in [−scale, scale].
    pub fn random<R: Rng + ?Sized>(n: usize, scale: f64, rng: &mut R) -> Self {
        let mut m = Self::zeros(n);
        for z in &mut m.data {
            *z = Complex64::new(
                scale * rng.gen_range(-1.0..=1.0),
                scale * rng.gen_range(-1.0..=1.0),
            );
        }
        m
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Complex64) {
        self.data[row * self.n + col] = value;
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: Complex64) {
        self.data[row * self.n + col] += value;
    }

    /// Conjugate transpose.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        let n = self.n;
        let mut out = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                out.data[j * n + i] = self.data[i * n + j].conj();
            }
        }
        out
    }

    /// self + other
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (a, b) in out.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        out
    }

    /// self · other
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let n = self.n;
        let mut out = Self::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self.data[i * n + k];
                for j in 0..n {
                    out.data[i * n + j] += a * other.data[k * n + j];
                }
            }
        }
        out
    }

    /// y += A x
    #[inline]
    pub fn mul_vec_acc(&self, x: &[Complex64], y: &mut [Complex64]) {
        for (row, yi) in self.data.chunks_exact(self.n).zip(y.iter_mut()) {
            *yi += row.iter().zip(x).map(|(a, xj)| a * xj).sum::<Complex64>();
        }
    }

    /// y += A† x
    #[inline]
    pub fn adj_mul_vec_acc(&self, x: &[Complex64], y: &mut [Complex64]) {
        for (row, xi) in self.data.chunks_exact(self.n).zip(x) {
            for (a, yj) in row.iter().zip(y.iter_mut()) {
                *yj += a.conj() * xi;
            }
        }
    }

    /// Largest entry modulus.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.data.iter().map(|z| z.norm()).fold(0.0, f64::max)
    }

    /// Gauss–Jordan inverse with partial pivoting.
    ///
    /// `None` if a pivot falls below `PIVOT_GUARD_REL` of the largest entry.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let n = self.n;
        let scale = self.max_abs();
        if scale == 0.0 {
            return None;
        }
        let mut a = self.data.clone();
        let mut inv = Self::identity(n);

        for col in 0..n {
            let pivot_row = (col..n).max_by(|&i, &j| {
                a[i * n + col]
                    .norm()
                    .total_cmp(&a[j * n + col].norm())
            })?;
            if a[pivot_row * n + col].norm() < PIVOT_GUARD_REL * scale {
                return None;
            }
            if pivot_row != col {
                for k in 0..n {
                    a.swap(pivot_row * n + k, col * n + k);
                    inv.data.swap(pivot_row * n + k, col * n + k);
                }
            }

            let p = ONE / a[col * n + col];
            for k in 0..n {
                a[col * n + k] *= p;
                inv.data[col * n + k] *= p;
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let f = a[row * n + col];
                if f == ZERO {
                    continue;
                }
                for k in 0..n {
                    let ak = a[col * n + k];
                    let ik = inv.data[col * n + k];
                    a[row * n + k] -= f * ak;
                    inv.data[row * n + k] -= f * ik;
                }
            }
        }
        Some(inv)
    }
}
