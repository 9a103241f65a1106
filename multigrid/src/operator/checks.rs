// SPDX-License-Identifier: AGPL-3.0-only

//! Consistency checks for any [`LinearOperator`].
//!
//! Both return a dimensionless defect that is zero in exact arithmetic;
//! callers compare it against a bound from [`crate::tolerances`].

use num_complex::Complex64;

use super::LinearOperator;
use crate::error::Result;
use crate::lattice::LatticeField;
use crate::tolerances::DIVISION_GUARD;

/// |⟨x, op y⟩ − ⟨adj_op x, y⟩| / |⟨x, op y⟩|
///
/// Zero when `adj_op` is the adjoint of `op`. For Hermitian wrappers this is
/// the Hermiticity defect ⟨x,Hy⟩ vs ⟨Hx,y⟩.
pub fn adjoint_defect<L: LinearOperator + ?Sized>(
    op: &L,
    x: &LatticeField,
    y: &LatticeField,
) -> Result<f64> {
    let mut op_y = op.new_field()?;
    let mut adj_x = op.new_field()?;
    op.op(y, &mut op_y)?;
    op.adj_op(x, &mut adj_x)?;
    let lhs = x.dot(&op_y)?;
    let rhs = adj_x.dot(y)?;
    Ok((lhs - rhs).norm() / lhs.norm().max(DIVISION_GUARD))
}

/// ‖op(a x + b y) − a op(x) − b op(y)‖ / ‖op(a x + b y)‖
pub fn linearity_defect<L: LinearOperator + ?Sized>(
    op: &L,
    x: &LatticeField,
    y: &LatticeField,
    a: Complex64,
    b: Complex64,
) -> Result<f64> {
    let mut combo = op.new_field()?;
    combo.axpy(a, x)?;
    combo.axpy(b, y)?;

    let mut op_combo = op.new_field()?;
    op.op(&combo, &mut op_combo)?;
    let reference = op_combo.norm();

    let mut op_x = op.new_field()?;
    let mut op_y = op.new_field()?;
    op.op(x, &mut op_x)?;
    op.op(y, &mut op_y)?;
    op_combo.axpy(-a, &op_x)?;
    op_combo.axpy(-b, &op_y)?;
    Ok(op_combo.norm() / reference.max(DIVISION_GUARD))
}
