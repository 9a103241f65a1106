// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized numerical thresholds with their justification.
//!
//! Library guards (division, degeneracy) and the acceptance bounds used by
//! tests and validation binaries live here. No ad-hoc magic numbers.

// ═══════════════════════════════════════════════════════════════════
// Library guards
// ═══════════════════════════════════════════════════════════════════

/// Absolute floor for norms used as denominators in diagnostics and
/// normalisation. Far below any meaningful f64 norm.
pub const DIVISION_GUARD: f64 = 1e-30;

/// Conjugate Residual breakdown: |⟨r,Ar⟩| at or below this fraction of
/// ‖r‖·‖Ar‖ means `r` is numerically orthogonal to its image.
///
/// Relative, so a source of any magnitude iterates the same way.
pub const BREAKDOWN_REL: f64 = f64::EPSILON;

/// Relative norm below which a Gram–Schmidt residual counts as zero.
///
/// After projecting out the previous basis vectors of a block, a vector
/// retaining less than this fraction of its norm is linearly dependent to
/// working precision (≈ 1e6 × f64 epsilon).
pub const BASIS_DEGENERACY_REL: f64 = 1e-10;

/// Relative pivot below which a site-diagonal matrix is called singular.
pub const PIVOT_GUARD_REL: f64 = 1e-14;

// ═══════════════════════════════════════════════════════════════════
// Subspace construction defaults
// ═══════════════════════════════════════════════════════════════════

/// Loose CG tolerance for inverse-iteration smoothing of near-null vectors.
///
/// Only the low modes need amplifying; 1e-2 relative residual is enough and
/// keeps subspace construction cheap.
pub const SMOOTHER_CG_TOLERANCE: f64 = 1e-2;

/// Iteration cap for a single smoothing solve.
pub const SMOOTHER_CG_MAX_ITER: usize = 10_000;

/// Power-iteration steps used to estimate λ_max for Richardson smoothing.
pub const POWER_ITERATION_STEPS: usize = 20;

/// Factor applied to the power-iteration estimate of λ_max.
///
/// Power iteration approaches λ_max from below; with damping close to 2 an
/// underestimate would amplify the top modes instead of damping them.
pub const LAMBDA_MAX_SAFETY: f64 = 1.1;

// ═══════════════════════════════════════════════════════════════════
// Test and validation acceptance
// ═══════════════════════════════════════════════════════════════════

/// Hermiticity: |⟨x,Hy⟩ − ⟨Hx,y⟩| relative to |⟨x,Hy⟩|.
///
/// Exact in real arithmetic; summation-order rounding on ~10³ components
/// stays near 1e-14.
pub const HERMITICITY_REL: f64 = 1e-10;

/// Galerkin consistency: ‖R A P v − A_c v‖ / ‖A_c v‖.
///
/// Both sides compute the same sums in different order.
pub const GALERKIN_REL: f64 = 1e-10;

/// Orthonormality of the aggregated basis: max |⟨v_i,v_j⟩_b − δ_ij|.
pub const ORTHONORMALITY_ABS: f64 = 1e-10;

/// Solver relative residual target used by tests and validation.
pub const SOLVER_TOLERANCE: f64 = 1e-6;

/// Iteration budget paired with [`SOLVER_TOLERANCE`].
pub const SOLVER_MAX_ITER: usize = 1000;

/// Slack between the recursive and the recomputed (true) residual.
///
/// Recursive residuals drift from b − Ax by accumulated rounding; an order of
/// magnitude above the target is still a converged solve.
pub const TRUE_RESIDUAL_SLACK: f64 = 10.0;

/// Checkerboard reconstruction: full apply vs reassembled parity blocks.
pub const CHECKERBOARD_ABS: f64 = 1e-12;
