// SPDX-License-Identifier: AGPL-3.0-only

//! Partition of a fine lattice into blocks, one per coarse-lattice site.
//!
//! Block extents are `fine_dims[μ] / coarse_dims[μ]`; fine site `x` belongs to
//! the coarse site with coordinates `x_μ / block_μ`. Every block has the same
//! number of sites.

use std::sync::Arc;

use super::geometry::{Direction, Lattice};
use crate::error::{MultigridError, Result};

/// Fine lattice, coarse lattice, and the site ↔ block tables between them.
#[derive(Debug)]
pub struct Blocking {
    fine: Arc<Lattice>,
    coarse: Arc<Lattice>,
    block_dims: Vec<usize>,
    block_of: Vec<usize>,
    block_sites: Vec<Vec<usize>>,
}

impl Blocking {
    /// Fails with `InvalidGeometry` unless both lattices have the same number
    /// of dimensions and each fine extent is a multiple of the coarse one.
    pub fn new(fine: &Arc<Lattice>, coarse: &Arc<Lattice>) -> Result<Self> {
        if fine.n_dims() != coarse.n_dims() {
            return Err(MultigridError::InvalidGeometry(format!(
                "fine lattice {:?} and coarse lattice {:?} differ in dimension",
                fine.dims(),
                coarse.dims()
            )));
        }
        let mut block_dims = Vec::with_capacity(fine.n_dims());
        for (mu, (&lf, &lc)) in fine.dims().iter().zip(coarse.dims()).enumerate() {
            if lf % lc != 0 {
                return Err(MultigridError::InvalidGeometry(format!(
                    "fine extent {lf} is not a multiple of coarse extent {lc} in direction {mu}"
                )));
            }
            block_dims.push(lf / lc);
        }

        let mut block_of = Vec::with_capacity(fine.volume());
        let mut block_sites = vec![Vec::new(); coarse.volume()];
        let mut coarse_coords = vec![0usize; fine.n_dims()];
        for site in 0..fine.volume() {
            for (mu, c) in coarse_coords.iter_mut().enumerate() {
                *c = fine.coordinate(site, mu) / block_dims[mu];
            }
            let block = coarse.site_index(&coarse_coords);
            block_of.push(block);
            block_sites[block].push(site);
        }

        Ok(Self {
            fine: Arc::clone(fine),
            coarse: Arc::clone(coarse),
            block_dims,
            block_of,
            block_sites,
        })
    }

    #[must_use]
    pub fn fine(&self) -> &Arc<Lattice> {
        &self.fine
    }

    #[must_use]
    pub fn coarse(&self) -> &Arc<Lattice> {
        &self.coarse
    }

    #[must_use]
    pub fn block_dims(&self) -> &[usize] {
        &self.block_dims
    }

    /// Number of blocks (= coarse volume).
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.block_sites.len()
    }

    #[must_use]
    pub fn sites_per_block(&self) -> usize {
        self.block_dims.iter().product()
    }

    /// Coarse site owning fine site `site`.
    #[inline]
    #[must_use]
    pub fn block_of(&self, site: usize) -> usize {
        self.block_of[site]
    }

    /// Fine sites of a block, ascending.
    #[must_use]
    pub fn sites_in(&self, block: usize) -> &[usize] {
        &self.block_sites[block]
    }

    /// Whether the fine hop from `site` along `dir·mu` crosses into another
    /// block (or wraps around a block of extent one).
    #[inline]
    #[must_use]
    pub fn is_block_face(&self, site: usize, mu: usize, dir: Direction) -> bool {
        let b = self.block_dims[mu];
        let x = self.fine.coordinate(site, mu) % b;
        match dir {
            Direction::Forward => x == b - 1,
            Direction::Backward => x == 0,
        }
    }
}
