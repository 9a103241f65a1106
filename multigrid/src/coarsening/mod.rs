// SPDX-License-Identifier: AGPL-3.0-only

//! Aggregation-based coarsening.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `smoother` | Relaxation applied to random seeds |
//! | `aggregation` | Block-orthonormal near-null basis, restrict/prolong |
//! | `dense` | Small complex matrices for coarse site couplings |
//! | `coarsened` | Galerkin coarse operator, itself a [`SparseMatrix`](crate::operator::SparseMatrix) |
//!
//! A two-level setup is
//!
//! ```text
//! fine M ──MdagMLinearOperator──▶ Aggregation::create_subspace
//!    │                                      │
//!    └──NonHermitian/SelfAdjoint wrapper────┴──▶ CoarsenedMatrix::coarsen_operator
//! ```
//!
//! and the coarse matrix can be fed back in for a third level.

/// Block-aggregated basis.
pub mod aggregation;
/// Coarse operator.
pub mod coarsened;
/// Dense site matrices.
pub mod dense;
/// Seed smoothers.
pub mod smoother;

pub use aggregation::{Aggregation, SubspaceConfig};
pub use coarsened::{stencil_point, CoarsenedMatrix};
pub use dense::DenseMatrix;
pub use smoother::Smoother;
