// SPDX-License-Identifier: AGPL-3.0-only

//! Collective reductions across a partitioned lattice.
//!
//! Inner products and norms are the only synchronisation points of a Krylov
//! iteration: every rank reduces its local partial sum, then all ranks see the
//! same global value before the next step consumes it. The transport itself
//! (MPI, shared memory, ...) lives behind [`Communicator`].

use std::fmt::Debug;

use num_complex::Complex64;

/// Collective-reduction surface consumed by fields and solvers.
pub trait Communicator: Send + Sync + Debug {
    /// Rank of this process within the partition.
    fn rank(&self) -> usize;

    /// Number of ranks sharing the lattice.
    fn n_ranks(&self) -> usize;

    /// All-reduce sum of a real partial.
    fn sum_f64(&self, local: f64) -> f64;

    /// All-reduce sum of a complex partial.
    fn sum_complex(&self, local: Complex64) -> Complex64 {
        Complex64::new(self.sum_f64(local.re), self.sum_f64(local.im))
    }
}

/// The whole lattice is local: every reduction is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleRank;

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn sum_f64(&self, local: f64) -> f64 {
        local
    }

    fn sum_complex(&self, local: Complex64) -> Complex64 {
        local
    }
}
