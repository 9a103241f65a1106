// SPDX-License-Identifier: AGPL-3.0-only

//! Coarse-solve Benchmark — fine vs Galerkin-coarsened operator
//!
//! For a Hermitian indefinite model operator on growing 2D and 4D lattices:
//!   - apply time of H (fine) and H_c (coarse, 2^d blocks)
//!   - CG iterations and wall time on H†H and on H_c†H_c
//!   - subspace construction and coarsening cost
//!
//! The coarse solve is the inner step of a two-level preconditioner; its
//! cost per iteration should shrink with the block volume.

use std::sync::Arc;
use std::time::Instant;

use hotspring_multigrid::coarsening::{Aggregation, CoarsenedMatrix, SubspaceConfig};
use hotspring_multigrid::lattice::{Blocking, Checkerboard, Lattice, LatticeField};
use hotspring_multigrid::operator::{
    LinearOperator, MdagMLinearOperator, SelfAdjointLinearOperator,
};
use hotspring_multigrid::solver::{ConjugateGradient, SolverStats};
use hotspring_multigrid::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

const MASSES: [f64; 4] = [1.0, -1.0, 0.5, -0.5];
const HOP_SCALE: f64 = 0.05;
const N_BASIS: usize = 6;
const APPLY_REPS: usize = 20;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Coarse-solve benchmark — fine vs Galerkin coarse operator  ║");
    println!("║  dof=4, n_basis=6, CG tol=1e-8 on the normal operators      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let cases: [(&[usize], &[usize]); 4] = [
        (&[8, 8], &[4, 4]),
        (&[16, 16], &[8, 8]),
        (&[4, 4, 4, 4], &[2, 2, 2, 2]),
        (&[8, 8, 8, 4], &[4, 4, 4, 2]),
    ];
    for (fine, coarse) in cases {
        if let Err(e) = run_case(fine, coarse) {
            println!("  {fine:?} → {coarse:?} failed: {e}");
        }
    }
    println!();
}

fn run_case(fine_dims: &[usize], coarse_dims: &[usize]) -> Result<()> {
    println!("═══ {fine_dims:?} → {coarse_dims:?} ═══════════════════════════════");
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let fine_lat = Arc::new(Lattice::new(fine_dims)?);
    let coarse_lat = Arc::new(Lattice::new(coarse_dims)?);
    let blocking = Arc::new(Blocking::new(&fine_lat, &coarse_lat)?);

    let fine = CoarsenedMatrix::random_hermitian(&fine_lat, &MASSES, HOP_SCALE, &mut rng)?;

    let t0 = Instant::now();
    let aggregation = Aggregation::create_subspace(
        &blocking,
        &MdagMLinearOperator::new(&fine),
        &SubspaceConfig::new(N_BASIS),
        &mut rng,
    )?;
    let t_subspace = t0.elapsed();

    let t0 = Instant::now();
    let coarse = CoarsenedMatrix::coarsen_operator(&SelfAdjointLinearOperator::new(&fine), &aggregation)?;
    let t_coarsen = t0.elapsed();
    println!(
        "  setup: subspace {:.1}ms, coarsen {:.1}ms",
        t_subspace.as_secs_f64() * 1000.0,
        t_coarsen.as_secs_f64() * 1000.0
    );

    for (label, m) in [("fine", &fine), ("coarse", &coarse)] {
        let h = SelfAdjointLinearOperator::new(m);
        let v = LatticeField::gaussian(h.lattice(), h.site_dof(), Checkerboard::Full, &mut rng)?;
        let mut out = h.new_field()?;
        let t0 = Instant::now();
        for _ in 0..APPLY_REPS {
            h.op(&v, &mut out)?;
        }
        let per_apply_ms = t0.elapsed().as_secs_f64() * 1000.0 / APPLY_REPS as f64;

        let normal = MdagMLinearOperator::new(m);
        let mut x = normal.new_field()?;
        let t0 = Instant::now();
        let stats = match ConjugateGradient::new(1e-8, 20_000)?.solve(&normal, &v, &mut x) {
            Ok(stats) => stats,
            Err(e) => {
                println!("  {label:>6}: {e}");
                continue;
            }
        };
        let dt = t0.elapsed();
        report(label, h.lattice().volume() * h.site_dof(), per_apply_ms, &stats, dt.as_secs_f64());
    }
    Ok(())
}

fn report(label: &str, unknowns: usize, per_apply_ms: f64, stats: &SolverStats, seconds: f64) {
    println!(
        "  {label:>6}: N={unknowns:>7}, apply {per_apply_ms:.4}ms, CG iters={}, res={:.2e}, time={:.1}ms",
        stats.iterations,
        stats.true_residual,
        seconds * 1000.0
    );
}
