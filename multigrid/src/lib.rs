// SPDX-License-Identifier: AGPL-3.0-only

//! hotSpring multigrid — Krylov solvers and aggregation-based coarsening
//! for lattice operators.
//!
//! ## Layers
//!   - `lattice` — geometry, collective reductions, fields, block partitions
//!   - `operator` — the `SparseMatrix` capability and its linear-operator
//!     wrappers (non-Hermitian, checkerboard, normal, self-adjoint)
//!   - `solver` — conjugate gradient and conjugate residual over any wrapper
//!   - `coarsening` — near-null subspace aggregation and Galerkin coarse
//!     operators that are themselves `SparseMatrix` implementations
//!
//! ## Validation binaries
//!   - `validate_multigrid` — two-level pipeline with pass/fail checks
//!   - `bench_coarse_solve` — fine vs coarse apply and solve timings
//!
//! Numerical thresholds live in `tolerances`; nothing else hardcodes one.

pub mod coarsening;
pub mod error;
pub mod lattice;
pub mod operator;
pub mod solver;
pub mod tolerances;
pub mod validation;

pub use error::{MultigridError, Result};
