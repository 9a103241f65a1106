// SPDX-License-Identifier: AGPL-3.0-only

//! Sparse-matrix capability and the linear-operator layer built on it.
//!
//! A [`SparseMatrix`] is what a discretised action exposes: the forward
//! operator `M`, its adjoint, the normal operator `M†M`, and the
//! checkerboard (odd-site Schur complement) counterparts `Mpc`, `Mpc†`,
//! `Mpc†Mpc`. Generic algorithms never see it directly; they see one of the
//! [`linear`] wrappers, which fix which pair of actions plays `op`/`adj_op`.
//!
//! Beyond the six named actions a matrix exposes its parity blocks
//!
//! ```text
//!       ⎛ Mee  Meo ⎞
//!   M = ⎝ Moe  Moo ⎠      Mooee = site-local part, Meooe = parity-changing hops
//! ```
//!
//! and its nearest-neighbour decomposition `M = M_diag + Σ_{μ,±} M_dir(μ,±)`,
//! which coarsening needs to attribute couplings to block faces.

use std::sync::Arc;

use crate::error::Result;
use crate::lattice::{Checkerboard, Direction, Lattice, LatticeField, Parity};

/// Operator-consistency checks (adjoint pairing, linearity).
pub mod checks;
/// The closed set of linear-operator wrappers.
pub mod linear;

pub use linear::{
    HermitianOperator, LinearOperator, MdagMLinearOperator, MpcDagMpcLinearOperator,
    NonHermitianCheckerboardOperator, NonHermitianLinearOperator, OperatorKind,
    SelfAdjointLinearOperator,
};

/// Parity on which the checkerboard (Schur-complement) actions operate.
pub const SCHUR_PARITY: Parity = Parity::Odd;

/// Sparse-matrix capability of a lattice operator.
///
/// Full-lattice actions take and return [`Checkerboard::Full`] fields; the
/// `mpc*` actions take and return fields on [`SCHUR_PARITY`]; the parity
/// blocks map between half-lattice fields as documented per method.
/// Implementations must reject operands of the wrong shape with
/// `IncompatibleOperand`.
pub trait SparseMatrix {
    /// Lattice the operator acts on.
    fn lattice(&self) -> &Arc<Lattice>;

    /// Components per site of the fields it acts on.
    fn site_dof(&self) -> usize;

    /// out = M in
    fn m(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// out = M in; returns ‖out‖².
    fn m_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.m(input, out)?;
        Ok(out.norm_sq())
    }

    /// out = M† in
    fn m_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// out = M†M in; returns ‖out‖².
    fn m_dag_m(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        let mut tmp = input.zeros_like();
        self.m(input, &mut tmp)?;
        self.m_dag(&tmp, out)?;
        Ok(out.norm_sq())
    }

    /// Site-local part of M (no hops).
    fn m_diag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// Hopping part of M along one direction only:
    /// `out(x) = M[x, x + dir·μ] in(x + dir·μ)`.
    fn m_dir(
        &self,
        input: &LatticeField,
        out: &mut LatticeField,
        mu: usize,
        dir: Direction,
    ) -> Result<()>;

    /// Parity-changing block: input on one parity, output on the other.
    fn meooe(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// Parity-changing block of M†.
    fn meooe_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// Parity-preserving block (site-local part restricted to one parity).
    fn mooee(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    fn mooee_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    fn mooee_inv(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    fn mooee_inv_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// Odd-site Schur complement `Mpc = Moo − Moe Mee⁻¹ Meo`.
    fn mpc(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        let (mut even, mut even_inv, mut hop) = schur_workspace(self, input, out)?;
        self.meooe(input, &mut even)?;
        self.mooee_inv(&even, &mut even_inv)?;
        self.meooe(&even_inv, &mut hop)?;
        self.mooee(input, out)?;
        out.axpy_real(-1.0, &hop)
    }

    /// `Mpc† = Moo† − Meo† Mee⁻† Moe†`
    fn mpc_dag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        let (mut even, mut even_inv, mut hop) = schur_workspace(self, input, out)?;
        self.meooe_dag(input, &mut even)?;
        self.mooee_inv_dag(&even, &mut even_inv)?;
        self.meooe_dag(&even_inv, &mut hop)?;
        self.mooee_dag(input, out)?;
        out.axpy_real(-1.0, &hop)
    }

    /// out = Mpc† Mpc in; returns ‖out‖².
    fn mpc_dag_mpc(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        let mut tmp = input.zeros_like();
        self.mpc(input, &mut tmp)?;
        self.mpc_dag(&tmp, out)?;
        Ok(out.norm_sq())
    }
}

/// Checks Schur operands and allocates the even/odd temporaries.
fn schur_workspace<M: SparseMatrix + ?Sized>(
    matrix: &M,
    input: &LatticeField,
    out: &LatticeField,
) -> Result<(LatticeField, LatticeField, LatticeField)> {
    let cb = Checkerboard::from(SCHUR_PARITY);
    input.ensure_domain(matrix.lattice(), cb, matrix.site_dof())?;
    out.ensure_domain(matrix.lattice(), cb, matrix.site_dof())?;
    let even = LatticeField::zeros(
        matrix.lattice(),
        matrix.site_dof(),
        Checkerboard::from(SCHUR_PARITY.opposite()),
    )?;
    Ok((even.zeros_like(), even, input.zeros_like()))
}
