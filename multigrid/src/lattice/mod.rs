// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice geometry, reductions, and fields.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `geometry` | Periodic lattice: indexing, neighbour table, parity |
//! | `communicator` | Collective sums behind inner products and norms |
//! | `field` | Complex fields on the full lattice or one checkerboard |
//! | `blocking` | Fine-to-coarse block partition used by aggregation |
//!
//! Geometry is never ambient: fields, operators, and aggregates all hold an
//! `Arc<Lattice>` handed to them at construction.

/// Fine-to-coarse block partition.
pub mod blocking;
/// Collective reduction interface and the single-rank implementation.
pub mod communicator;
/// Complex lattice fields and their vector-space operations.
pub mod field;
/// Periodic lattice geometry.
pub mod geometry;

pub use blocking::Blocking;
pub use communicator::{Communicator, SingleRank};
pub use field::LatticeField;
pub use geometry::{Checkerboard, Direction, Lattice, Parity};
