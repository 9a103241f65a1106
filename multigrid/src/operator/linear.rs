// SPDX-License-Identifier: AGPL-3.0-only

//! Linear-operator wrappers over a [`SparseMatrix`].
//!
//! Each wrapper borrows its matrix and selects which named actions play
//! `op` and `adj_op`:
//!
//! | Wrapper | `op` | `adj_op` | Domain |
//! |---------|------|----------|--------|
//! | [`NonHermitianLinearOperator`] | `M` | `M†` | full |
//! | [`NonHermitianCheckerboardOperator`] | `Mpc` | `Mpc†` | odd sites |
//! | [`MdagMLinearOperator`] | `M†M` | `M†M` | full |
//! | [`MpcDagMpcLinearOperator`] | `Mpc†Mpc` | `Mpc†Mpc` | odd sites |
//! | [`SelfAdjointLinearOperator`] | `M` | `M` | full (M Hermitian) |
//!
//! Hermitian wrappers implement `adj_op` by calling `op`, so the two can
//! never diverge. Wrappers hold no state besides the borrow: two wrappers
//! over the same matrix are interchangeable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::SparseMatrix;
use crate::error::{MultigridError, Result};
use crate::lattice::{Checkerboard, Direction, Lattice, LatticeField};

/// Tag of a wrapper variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    NonHermitian,
    NonHermitianCheckerboard,
    HermitianNormal,
    HermitianNormalCheckerboard,
    SelfAdjoint,
}

impl OperatorKind {
    #[must_use]
    pub const fn is_hermitian(self) -> bool {
        !matches!(self, Self::NonHermitian | Self::NonHermitianCheckerboard)
    }

    /// Domain (and range) of the wrapped action; checkerboard variants act
    /// on the odd sites.
    #[must_use]
    pub const fn checkerboard(self) -> Checkerboard {
        match self {
            Self::NonHermitianCheckerboard | Self::HermitianNormalCheckerboard => Checkerboard::Odd,
            _ => Checkerboard::Full,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NonHermitian => "NonHermitianLinearOperator",
            Self::NonHermitianCheckerboard => "NonHermitianCheckerboardOperator",
            Self::HermitianNormal => "MdagMLinearOperator",
            Self::HermitianNormalCheckerboard => "MpcDagMpcLinearOperator",
            Self::SelfAdjoint => "SelfAdjointLinearOperator",
        }
    }
}

/// Uniform two-action interface consumed by solvers and coarsening.
pub trait LinearOperator {
    fn kind(&self) -> OperatorKind;

    fn lattice(&self) -> &Arc<Lattice>;

    fn site_dof(&self) -> usize;

    fn checkerboard(&self) -> Checkerboard {
        self.kind().checkerboard()
    }

    /// Zero field on this operator's domain.
    fn new_field(&self) -> Result<LatticeField> {
        LatticeField::zeros(self.lattice(), self.site_dof(), self.checkerboard())
    }

    /// Fail with `IncompatibleOperand` unless both fields live on the
    /// operator's domain.
    fn ensure_operands(&self, input: &LatticeField, out: &LatticeField) -> Result<()> {
        input.ensure_domain(self.lattice(), self.checkerboard(), self.site_dof())?;
        out.ensure_domain(self.lattice(), self.checkerboard(), self.site_dof())
    }

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()>;

    /// Site-local part of `op`.
    fn op_diag(&self, _input: &LatticeField, _out: &mut LatticeField) -> Result<()> {
        Err(MultigridError::UnsupportedAction {
            operator: self.kind().name(),
            action: "op_diag",
        })
    }

    /// One-hop part of `op` along `dir·mu`.
    fn op_dir(
        &self,
        _input: &LatticeField,
        _out: &mut LatticeField,
        _mu: usize,
        _dir: Direction,
    ) -> Result<()> {
        Err(MultigridError::UnsupportedAction {
            operator: self.kind().name(),
            action: "op_dir",
        })
    }
}

/// A [`LinearOperator`] whose `op` equals its `adj_op`.
pub trait HermitianOperator: LinearOperator {
    /// `out = op(input)`; returns ‖out‖².
    fn op_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64>;
}

macro_rules! borrowed_wrapper {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<'a, M: ?Sized> {
            matrix: &'a M,
        }

        impl<'a, M: SparseMatrix + ?Sized> $name<'a, M> {
            #[must_use]
            pub const fn new(matrix: &'a M) -> Self {
                Self { matrix }
            }

            #[must_use]
            pub const fn matrix(&self) -> &'a M {
                self.matrix
            }
        }

        impl<M: ?Sized> Clone for $name<'_, M> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<M: ?Sized> Copy for $name<'_, M> {}

        impl<M: SparseMatrix + ?Sized> $name<'_, M> {
            const KIND: OperatorKind = $kind;
        }
    };
}

borrowed_wrapper!(
    /// `op = M`, `adj_op = M†` on full-lattice fields.
    NonHermitianLinearOperator,
    OperatorKind::NonHermitian
);

borrowed_wrapper!(
    /// `op = Mpc`, `adj_op = Mpc†` on odd-site fields.
    NonHermitianCheckerboardOperator,
    OperatorKind::NonHermitianCheckerboard
);

borrowed_wrapper!(
    /// `op = adj_op = M†M` on full-lattice fields.
    MdagMLinearOperator,
    OperatorKind::HermitianNormal
);

borrowed_wrapper!(
    /// `op = adj_op = Mpc†Mpc` on odd-site fields.
    MpcDagMpcLinearOperator,
    OperatorKind::HermitianNormalCheckerboard
);

borrowed_wrapper!(
    /// `op = adj_op = M` for a matrix that is itself Hermitian (possibly
    /// indefinite). Hermiticity of `M` is the caller's claim; it is not
    /// checked here (see [`checks::adjoint_defect`](super::checks::adjoint_defect)).
    SelfAdjointLinearOperator,
    OperatorKind::SelfAdjoint
);

macro_rules! domain_queries {
    () => {
        fn kind(&self) -> OperatorKind {
            Self::KIND
        }

        fn lattice(&self) -> &Arc<Lattice> {
            self.matrix.lattice()
        }

        fn site_dof(&self) -> usize {
            self.matrix.site_dof()
        }
    };
}

impl<M: SparseMatrix + ?Sized> LinearOperator for NonHermitianLinearOperator<'_, M> {
    domain_queries!();

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m(input, out)
    }

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m_dag(input, out)
    }

    fn op_diag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m_diag(input, out)
    }

    fn op_dir(
        &self,
        input: &LatticeField,
        out: &mut LatticeField,
        mu: usize,
        dir: Direction,
    ) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m_dir(input, out, mu, dir)
    }
}

impl<M: SparseMatrix + ?Sized> LinearOperator for NonHermitianCheckerboardOperator<'_, M> {
    domain_queries!();

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.mpc(input, out)
    }

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.mpc_dag(input, out)
    }
}

impl<M: SparseMatrix + ?Sized> LinearOperator for MdagMLinearOperator<'_, M> {
    domain_queries!();

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.op_and_norm(input, out).map(|_| ())
    }

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.op(input, out)
    }
}

impl<M: SparseMatrix + ?Sized> HermitianOperator for MdagMLinearOperator<'_, M> {
    fn op_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.ensure_operands(input, out)?;
        self.matrix.m_dag_m(input, out)
    }
}

impl<M: SparseMatrix + ?Sized> LinearOperator for MpcDagMpcLinearOperator<'_, M> {
    domain_queries!();

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.op_and_norm(input, out).map(|_| ())
    }

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.op(input, out)
    }
}

impl<M: SparseMatrix + ?Sized> HermitianOperator for MpcDagMpcLinearOperator<'_, M> {
    fn op_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.ensure_operands(input, out)?;
        self.matrix.mpc_dag_mpc(input, out)
    }
}

impl<M: SparseMatrix + ?Sized> LinearOperator for SelfAdjointLinearOperator<'_, M> {
    domain_queries!();

    fn op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m(input, out)
    }

    fn adj_op(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.op(input, out)
    }

    fn op_diag(&self, input: &LatticeField, out: &mut LatticeField) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m_diag(input, out)
    }

    fn op_dir(
        &self,
        input: &LatticeField,
        out: &mut LatticeField,
        mu: usize,
        dir: Direction,
    ) -> Result<()> {
        self.ensure_operands(input, out)?;
        self.matrix.m_dir(input, out, mu, dir)
    }
}

impl<M: SparseMatrix + ?Sized> HermitianOperator for SelfAdjointLinearOperator<'_, M> {
    fn op_and_norm(&self, input: &LatticeField, out: &mut LatticeField) -> Result<f64> {
        self.ensure_operands(input, out)?;
        self.matrix.m_and_norm(input, out)
    }
}
