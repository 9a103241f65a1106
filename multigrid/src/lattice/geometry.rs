// SPDX-License-Identifier: AGPL-3.0-only

//! Regular periodic lattice: site indexing, neighbours, and parity.
//!
//! Site order is lexicographic with direction 0 running fastest:
//!
//!   `idx = x_0 + L_0 (x_1 + L_1 (x_2 + ...))`
//!
//! The neighbour table is built once at construction so stencil loops do a
//! single lookup per hop. Parity is `(Σ_μ x_μ) mod 2`; a lattice is
//! checkerboardable when every extent is even, so that each nearest-neighbour
//! hop (including the periodic wrap) flips parity.

use std::sync::Arc;

use super::communicator::{Communicator, SingleRank};
use crate::error::{MultigridError, Result};

/// Hop orientation along a lattice axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Both orientations, forward first.
    pub const ALL: [Self; 2] = [Self::Forward, Self::Backward];

    /// 0 for forward, 1 for backward.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Forward => 0,
            Self::Backward => 1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Site parity class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }

    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Even => Self::Odd,
            Self::Odd => Self::Even,
        }
    }
}

/// Which sites a field lives on: all of them, or one parity class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checkerboard {
    Full,
    Even,
    Odd,
}

impl Checkerboard {
    /// The parity of a half-lattice subset, `None` for the full lattice.
    #[must_use]
    pub const fn parity(self) -> Option<Parity> {
        match self {
            Self::Full => None,
            Self::Even => Some(Parity::Even),
            Self::Odd => Some(Parity::Odd),
        }
    }
}

impl From<Parity> for Checkerboard {
    fn from(p: Parity) -> Self {
        match p {
            Parity::Even => Self::Even,
            Parity::Odd => Self::Odd,
        }
    }
}

/// Periodic hypercubic lattice (local volume of one rank).
#[derive(Debug)]
pub struct Lattice {
    dims: Vec<usize>,
    strides: Vec<usize>,
    volume: usize,
    /// `neighbors[site * 2 * n_dims + 2 * mu + dir]`
    neighbors: Vec<usize>,
    /// Full-lattice indices of the even and odd sites, ascending.
    cb_sites: [Vec<usize>; 2],
    /// Position of each site within its parity list.
    cb_index: Vec<usize>,
    parity: Vec<Parity>,
    comm: Arc<dyn Communicator>,
}

impl Lattice {
    /// Single-rank lattice with the given extents.
    pub fn new(dims: &[usize]) -> Result<Self> {
        Self::with_communicator(dims, Arc::new(SingleRank))
    }

    /// Lattice whose reductions go through `comm`.
    pub fn with_communicator(dims: &[usize], comm: Arc<dyn Communicator>) -> Result<Self> {
        if dims.is_empty() {
            return Err(MultigridError::InvalidGeometry(
                "lattice needs at least one dimension".into(),
            ));
        }
        if let Some(mu) = dims.iter().position(|&l| l == 0) {
            return Err(MultigridError::InvalidGeometry(format!(
                "extent of direction {mu} is zero in {dims:?}"
            )));
        }

        let n_dims = dims.len();
        let mut strides = Vec::with_capacity(n_dims);
        let mut volume = 1usize;
        for &l in dims {
            strides.push(volume);
            volume *= l;
        }

        let mut neighbors = vec![0usize; volume * 2 * n_dims];
        let mut cb_sites = [Vec::with_capacity(volume / 2 + 1), Vec::with_capacity(volume / 2 + 1)];
        let mut cb_index = vec![0usize; volume];
        let mut parity = Vec::with_capacity(volume);

        for site in 0..volume {
            let mut coord_sum = 0usize;
            for mu in 0..n_dims {
                let l = dims[mu];
                let x = (site / strides[mu]) % l;
                coord_sum += x;
                let base = site - x * strides[mu];
                let fwd = base + ((x + 1) % l) * strides[mu];
                let bwd = base + ((x + l - 1) % l) * strides[mu];
                neighbors[site * 2 * n_dims + 2 * mu] = fwd;
                neighbors[site * 2 * n_dims + 2 * mu + 1] = bwd;
            }
            let p = if coord_sum % 2 == 0 { Parity::Even } else { Parity::Odd };
            cb_index[site] = cb_sites[p.index()].len();
            cb_sites[p.index()].push(site);
            parity.push(p);
        }

        Ok(Self {
            dims: dims.to_vec(),
            strides,
            volume,
            neighbors,
            cb_sites,
            cb_index,
            parity,
            comm,
        })
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[must_use]
    pub fn n_dims(&self) -> usize {
        self.dims.len()
    }

    /// Total number of local sites.
    #[must_use]
    pub const fn volume(&self) -> usize {
        self.volume
    }

    /// Linear index of a coordinate tuple (coordinates must be in range).
    #[must_use]
    pub fn site_index(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.dims.len());
        coords
            .iter()
            .zip(&self.strides)
            .map(|(&x, &s)| x * s)
            .sum()
    }

    /// Coordinate tuple of a linear site index.
    #[must_use]
    pub fn site_coords(&self, site: usize) -> Vec<usize> {
        (0..self.n_dims()).map(|mu| self.coordinate(site, mu)).collect()
    }

    /// Coordinate of `site` along direction `mu`.
    #[inline]
    #[must_use]
    pub fn coordinate(&self, site: usize, mu: usize) -> usize {
        (site / self.strides[mu]) % self.dims[mu]
    }

    /// Nearest neighbour of `site` one hop along `dir·mu`, periodic.
    #[inline]
    #[must_use]
    pub fn neighbor(&self, site: usize, mu: usize, dir: Direction) -> usize {
        self.neighbors[site * 2 * self.dims.len() + 2 * mu + dir.index()]
    }

    #[inline]
    #[must_use]
    pub fn parity(&self, site: usize) -> Parity {
        self.parity[site]
    }

    /// Every extent even, so parity flips on every hop.
    #[must_use]
    pub fn is_checkerboardable(&self) -> bool {
        self.dims.iter().all(|l| l % 2 == 0)
    }

    /// Full-lattice indices of the sites of one parity, ascending.
    #[must_use]
    pub fn cb_sites(&self, parity: Parity) -> &[usize] {
        &self.cb_sites[parity.index()]
    }

    /// Position of `site` inside the list of its parity class.
    #[inline]
    #[must_use]
    pub fn cb_index(&self, site: usize) -> usize {
        self.cb_index[site]
    }

    /// Number of sites in a checkerboard subset.
    #[must_use]
    pub fn n_sites(&self, cb: Checkerboard) -> usize {
        match cb.parity() {
            None => self.volume,
            Some(p) => self.cb_sites[p.index()].len(),
        }
    }

    /// Full-lattice index of the `i`-th site of a subset.
    #[inline]
    #[must_use]
    pub fn subset_site(&self, cb: Checkerboard, i: usize) -> usize {
        match cb.parity() {
            None => i,
            Some(p) => self.cb_sites[p.index()][i],
        }
    }

    /// Position of a full-lattice site within a subset it belongs to.
    #[inline]
    #[must_use]
    pub fn subset_index(&self, cb: Checkerboard, site: usize) -> usize {
        match cb {
            Checkerboard::Full => site,
            _ => self.cb_index[site],
        }
    }

    /// Reduction surface shared by every field on this lattice.
    #[must_use]
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Same extents (two lattices with equal dims are interchangeable).
    #[must_use]
    pub fn same_geometry(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.dims == other.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_zero_extent() {
        assert!(Lattice::new(&[]).is_err());
        assert!(Lattice::new(&[4, 0, 4]).is_err());
    }

    #[test]
    fn index_coords_roundtrip() {
        let lat = Lattice::new(&[4, 3, 2]).expect("lattice");
        assert_eq!(lat.volume(), 24);
        for site in 0..lat.volume() {
            let x = lat.site_coords(site);
            assert_eq!(lat.site_index(&x), site);
        }
        assert_eq!(lat.site_index(&[1, 0, 0]), 1);
        assert_eq!(lat.site_index(&[0, 1, 0]), 4);
        assert_eq!(lat.site_index(&[0, 0, 1]), 12);
    }

    #[test]
    fn periodic_neighbors() {
        let lat = Lattice::new(&[4, 4]).expect("lattice");
        let origin = lat.site_index(&[0, 0]);
        let wrap = lat.neighbor(origin, 0, Direction::Backward);
        assert_eq!(lat.site_coords(wrap), vec![3, 0]);
        let up = lat.neighbor(origin, 1, Direction::Forward);
        assert_eq!(lat.site_coords(up), vec![0, 1]);
        for site in 0..lat.volume() {
            for mu in 0..2 {
                let f = lat.neighbor(site, mu, Direction::Forward);
                assert_eq!(lat.neighbor(f, mu, Direction::Backward), site);
            }
        }
    }

    #[test]
    fn checkerboard_partition() {
        let lat = Lattice::new(&[4, 2, 2]).expect("lattice");
        assert!(lat.is_checkerboardable());
        assert_eq!(lat.n_sites(Checkerboard::Even), 8);
        assert_eq!(lat.n_sites(Checkerboard::Odd), 8);
        for site in 0..lat.volume() {
            let p = lat.parity(site);
            assert_eq!(lat.cb_sites(p)[lat.cb_index(site)], site);
            for mu in 0..3 {
                for dir in Direction::ALL {
                    let n = lat.neighbor(site, mu, dir);
                    assert_eq!(lat.parity(n), p.opposite(), "hop must flip parity");
                }
            }
        }
    }

    #[test]
    fn odd_extent_not_checkerboardable() {
        let lat = Lattice::new(&[3, 4]).expect("lattice");
        assert!(!lat.is_checkerboardable());
    }
}
