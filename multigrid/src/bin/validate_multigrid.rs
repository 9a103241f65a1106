// SPDX-License-Identifier: AGPL-3.0-only

//! Two-level Multigrid Validation
//!
//! Builds a Hermitian indefinite nearest-neighbour operator H on an 8×8
//! lattice, aggregates a 4-vector near-null subspace from H†H on 2×2 blocks,
//! Galerkin-coarsens H onto the resulting 4×4 lattice, and solves there:
//!   - CG on the coarse normal operator H_c†H_c (tol 1e-6)
//!   - CR on the coarse Hermitian operator H_c itself
//!
//! Along the way every operator property the solvers rely on is checked:
//! Hermiticity, adjoint pairing, linearity, wrapper statelessness, parity
//! reassembly, block orthonormality, and R·H·P = H_c.
//!
//! Usage: `validate_multigrid [--json <path>]`
//!
//! Exit code 0 = all checks pass, exit code 1 = any check fails.

use std::path::PathBuf;
use std::sync::Arc;

use hotspring_multigrid::coarsening::{Aggregation, CoarsenedMatrix, SubspaceConfig};
use hotspring_multigrid::lattice::{Blocking, Checkerboard, Lattice, LatticeField, Parity};
use hotspring_multigrid::operator::checks::{adjoint_defect, linearity_defect};
use hotspring_multigrid::operator::{
    LinearOperator, MdagMLinearOperator, NonHermitianCheckerboardOperator,
    NonHermitianLinearOperator, SelfAdjointLinearOperator, SparseMatrix,
};
use hotspring_multigrid::solver::{ConjugateGradient, ConjugateResidual};
use hotspring_multigrid::tolerances::{
    CHECKERBOARD_ABS, GALERKIN_REL, HERMITICITY_REL, ORTHONORMALITY_ABS, SOLVER_TOLERANCE,
    TRUE_RESIDUAL_SLACK,
};
use hotspring_multigrid::validation::ValidationReport;
use hotspring_multigrid::Result;
use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

const FINE_DIMS: [usize; 2] = [8, 8];
const COARSE_DIMS: [usize; 2] = [4, 4];
const MASSES: [f64; 2] = [1.0, -1.0];
const HOP_SCALE: f64 = 0.1;
const N_BASIS: usize = 4;
const SEED: u64 = 42;
/// Iteration budget of the coarse solves.
const COARSE_MAX_ITER: usize = 10_000;

struct Levels {
    fine: CoarsenedMatrix,
    aggregation: Aggregation,
    coarse: CoarsenedMatrix,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let json_path = json_path_arg();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Two-level multigrid — aggregation + Galerkin coarsening    ║");
    println!("║  8×8 fine, 2×2 blocks, 4 basis vectors, CG + CR coarse     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut report = ValidationReport::new("multigrid_two_level");
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);

    match build_levels(&mut rng) {
        Ok(levels) => {
            let sections: [(&str, fn(&Levels, &mut ChaCha8Rng, &mut ValidationReport) -> Result<()>); 7] = [
                ("fine operator", check_fine_operator),
                ("wrapping", check_wrapping),
                ("checkerboard", check_checkerboard),
                ("subspace", check_subspace),
                ("Galerkin", check_galerkin),
                ("coarse solves", check_coarse_solves),
                ("third level", check_third_level),
            ];
            for (name, section) in sections {
                if let Err(e) = section(&levels, &mut rng, &mut report) {
                    println!("  {name} aborted: {e}");
                    report.check_flag(&format!("{name}: no error"), false);
                }
            }
        }
        Err(e) => {
            println!("  setup failed: {e}");
            report.check_flag("two-level setup", false);
        }
    }

    println!();
    print!("{}", report.summary());
    if let Some(path) = json_path {
        if let Err(e) = report.write_json(&path) {
            println!("could not write {}: {e}", path.display());
            std::process::exit(1);
        }
    }
    std::process::exit(report.exit_code());
}

fn json_path_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--json" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn build_levels(rng: &mut ChaCha8Rng) -> Result<Levels> {
    let fine_lat = Arc::new(Lattice::new(&FINE_DIMS)?);
    let coarse_lat = Arc::new(Lattice::new(&COARSE_DIMS)?);
    let blocking = Arc::new(Blocking::new(&fine_lat, &coarse_lat)?);

    let fine = CoarsenedMatrix::random_hermitian(&fine_lat, &MASSES, HOP_SCALE, rng)?;
    let aggregation = Aggregation::create_subspace(
        &blocking,
        &MdagMLinearOperator::new(&fine),
        &SubspaceConfig::new(N_BASIS),
        rng,
    )?;
    let coarse =
        CoarsenedMatrix::coarsen_operator(&SelfAdjointLinearOperator::new(&fine), &aggregation)?;
    Ok(Levels {
        fine,
        aggregation,
        coarse,
    })
}

fn gaussian(lattice: &Arc<Lattice>, dof: usize, cb: Checkerboard, rng: &mut ChaCha8Rng) -> Result<LatticeField> {
    LatticeField::gaussian(lattice, dof, cb, rng)
}

fn relative_distance(a: &LatticeField, b: &LatticeField) -> Result<f64> {
    let mut d = a.zeros_like();
    d.assign_sub(a, b)?;
    Ok(d.norm() / b.norm())
}

/// \[1\] Hermiticity and linearity of the fine operator and its wrappers.
fn check_fine_operator(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[1] Fine operator: Hermiticity, adjoint pairing, linearity");
    let lat = levels.fine.lattice();
    let dof = levels.fine.site_dof();
    let x = gaussian(lat, dof, Checkerboard::Full, rng)?;
    let y = gaussian(lat, dof, Checkerboard::Full, rng)?;

    let h = SelfAdjointLinearOperator::new(&levels.fine);
    let hdag_h = MdagMLinearOperator::new(&levels.fine);
    report.check_below("⟨x,Hy⟩ = ⟨Hx,y⟩", adjoint_defect(&h, &x, &y)?, HERMITICITY_REL);
    report.check_below("⟨x,H†Hy⟩ = ⟨H†Hx,y⟩", adjoint_defect(&hdag_h, &x, &y)?, HERMITICITY_REL);

    let xo = gaussian(lat, dof, Checkerboard::Odd, rng)?;
    let yo = gaussian(lat, dof, Checkerboard::Odd, rng)?;
    let mpc = NonHermitianCheckerboardOperator::new(&levels.fine);
    report.check_below("Mpc† pairs with Mpc", adjoint_defect(&mpc, &xo, &yo)?, HERMITICITY_REL);

    let a = Complex64::new(0.75, -0.5);
    let b = Complex64::new(-1.25, 2.0);
    report.check_below(
        "H linear",
        linearity_defect(&h, &x, &y, a, b)?,
        HERMITICITY_REL,
    );
    Ok(())
}

/// \[2\] Two wrappers over one matrix agree bit for bit.
fn check_wrapping(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[2] Wrapper statelessness");
    let first = NonHermitianLinearOperator::new(&levels.fine);
    let second = NonHermitianLinearOperator::new(&levels.fine);
    let x = gaussian(first.lattice(), first.site_dof(), Checkerboard::Full, rng)?;
    let mut y1 = first.new_field()?;
    let mut y2 = second.new_field()?;
    first.op(&x, &mut y1)?;
    second.op(&x, &mut y2)?;
    first.op(&x, &mut y1)?;
    report.check_flag("identical outputs from two wrappers", y1.data() == y2.data());
    Ok(())
}

/// \[3\] Full apply = parity blocks reassembled.
fn check_checkerboard(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[3] Checkerboard reconstruction");
    let m = &levels.fine;
    let v = gaussian(m.lattice(), m.site_dof(), Checkerboard::Full, rng)?;
    let mut full = v.zeros_like();
    m.m(&v, &mut full)?;

    let mut rebuilt = v.zeros_like();
    for parity in [Parity::Even, Parity::Odd] {
        let same = v.pick_checkerboard(parity)?;
        let other = v.pick_checkerboard(parity.opposite())?;
        let mut diag = same.zeros_like();
        let mut hop = same.zeros_like();
        m.mooee(&same, &mut diag)?;
        m.meooe(&other, &mut hop)?;
        diag.axpy_real(1.0, &hop)?;
        rebuilt.set_checkerboard(&diag)?;
    }
    report.check_below("M = Mooee + Meooe", relative_distance(&rebuilt, &full)?, CHECKERBOARD_ABS);
    Ok(())
}

/// \[4\] Block orthonormality of the aggregated basis.
fn check_subspace(levels: &Levels, _rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[4] Subspace orthonormality");
    report.check_below(
        "max |⟨φ_i,φ_j⟩_B − δ_ij|",
        levels.aggregation.orthonormality_defect(),
        ORTHONORMALITY_ABS,
    );
    Ok(())
}

/// \[5\] R H P v = H_c v for random coarse vectors.
fn check_galerkin(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[5] Galerkin consistency");
    let h = SelfAdjointLinearOperator::new(&levels.fine);
    let hc = SelfAdjointLinearOperator::new(&levels.coarse);
    let mut worst = 0.0_f64;
    for _ in 0..3 {
        let v = gaussian(hc.lattice(), hc.site_dof(), Checkerboard::Full, rng)?;
        let mut fine_out = h.new_field()?;
        h.op(&levels.aggregation.promote(&v)?, &mut fine_out)?;
        let galerkin = levels.aggregation.project(&fine_out)?;
        let mut direct = hc.new_field()?;
        hc.op(&v, &mut direct)?;
        worst = worst.max(relative_distance(&galerkin, &direct)?);
    }
    report.check_below("‖R H P v − H_c v‖ / ‖H_c v‖", worst, GALERKIN_REL);

    let x = gaussian(hc.lattice(), hc.site_dof(), Checkerboard::Full, rng)?;
    let y = gaussian(hc.lattice(), hc.site_dof(), Checkerboard::Full, rng)?;
    report.check_below("H_c Hermitian", adjoint_defect(&hc, &x, &y)?, HERMITICITY_REL);
    Ok(())
}

/// \[6\] CG on H_c†H_c and CR on H_c.
fn check_coarse_solves(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[6] Coarse solves");
    let normal = MdagMLinearOperator::new(&levels.coarse);
    let herm = SelfAdjointLinearOperator::new(&levels.coarse);
    let b = gaussian(normal.lattice(), normal.site_dof(), Checkerboard::Full, rng)?;

    let mut x = normal.new_field()?;
    let cg = ConjugateGradient::new(SOLVER_TOLERANCE, COARSE_MAX_ITER)?;
    let stats = cg.solve(&normal, &b, &mut x)?;
    println!("  CG: {} iterations, true residual {:.2e}", stats.iterations, stats.true_residual);
    report.check_flag("CG converged", stats.converged);
    report.check_below(
        "CG ‖b − A x‖ / ‖b‖",
        stats.true_residual,
        SOLVER_TOLERANCE * TRUE_RESIDUAL_SLACK,
    );

    let mut x = herm.new_field()?;
    let cr = ConjugateResidual::new(SOLVER_TOLERANCE, COARSE_MAX_ITER)?;
    let stats = cr.solve(&herm, &b, &mut x)?;
    println!("  CR: {} iterations, true residual {:.2e}", stats.iterations, stats.true_residual);
    report.check_flag("CR converged", stats.converged);
    report.check_below(
        "CR ‖b − H x‖ / ‖b‖",
        stats.true_residual,
        SOLVER_TOLERANCE * TRUE_RESIDUAL_SLACK,
    );

    let zero = normal.new_field()?;
    let mut x = gaussian(normal.lattice(), normal.site_dof(), Checkerboard::Full, rng)?;
    let stats = cg.solve(&normal, &zero, &mut x)?;
    report.check_flag("CG b = 0 → x = 0 in 0 iterations", stats.iterations == 0 && x.norm_sq() == 0.0);
    Ok(())
}

/// \[7\] The coarse operator coarsens again.
fn check_third_level(levels: &Levels, rng: &mut ChaCha8Rng, report: &mut ValidationReport) -> Result<()> {
    println!("[7] Recursion: 4×4 → 2×2");
    let coarse_lat = levels.coarse.lattice();
    let coarsest_lat = Arc::new(Lattice::new(&[2, 2])?);
    let blocking = Arc::new(Blocking::new(coarse_lat, &coarsest_lat)?);
    let aggregation = Aggregation::create_subspace(
        &blocking,
        &MdagMLinearOperator::new(&levels.coarse),
        &SubspaceConfig::new(N_BASIS),
        rng,
    )?;
    let hc = SelfAdjointLinearOperator::new(&levels.coarse);
    let coarsest = CoarsenedMatrix::coarsen_operator(&hc, &aggregation)?;

    let v = gaussian(&coarsest_lat, N_BASIS, Checkerboard::Full, rng)?;
    let mut mid = hc.new_field()?;
    hc.op(&aggregation.promote(&v)?, &mut mid)?;
    let galerkin = aggregation.project(&mid)?;
    let mut direct = v.zeros_like();
    SelfAdjointLinearOperator::new(&coarsest).op(&v, &mut direct)?;
    report.check_below(
        "third-level Galerkin consistency",
        relative_distance(&galerkin, &direct)?,
        GALERKIN_REL,
    );
    Ok(())
}
