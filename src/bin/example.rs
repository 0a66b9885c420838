//! FEA Analysis Example - three storey stick model
//!
//! Each level has a lateral and a vertical DOF; storeys act as lateral and
//! axial springs. The base level is fixed.
//!
//!     L3  o
//!         |
//!     L2  o
//!         |
//!     L1  o
//!         |
//!     L0 ///

use anyhow::{Context, Result};
use log::info;

use fea_analysis::prelude::*;

const STOREYS: usize = 3;
const HEIGHT: f64 = 3.5;
const LATERAL_STIFFNESS: f64 = 2.0e7;
const AXIAL_STIFFNESS: f64 = 8.0e8;
const LEVEL_MASS: f64 = 2.0e4;

fn lateral(level: usize) -> usize {
    2 * level
}

fn vertical(level: usize) -> usize {
    2 * level + 1
}

fn add_spring(k: &mut Mat, i: usize, j: usize, stiffness: f64) {
    k[(i, i)] += stiffness;
    k[(j, j)] += stiffness;
    k[(i, j)] -= stiffness;
    k[(j, i)] -= stiffness;
}

/// Assemble the stick model with a P-delta geometric stiffness provider
fn assemble() -> Result<StructuralSystem> {
    let n = 2 * (STOREYS + 1);
    let mut k = Mat::zeros(n, n);
    for s in 1..=STOREYS {
        add_spring(&mut k, lateral(s - 1), lateral(s), LATERAL_STIFFNESS);
        add_spring(&mut k, vertical(s - 1), vertical(s), AXIAL_STIFFNESS);
    }
    let m = Mat::identity(n, n) * LEVEL_MASS;

    let system = StructuralSystem::new(k)?
        .with_mass(m)?
        .with_geometric_stiffness(|u: &FEVec| -> FEAResult<Mat> {
            let mut kg = Mat::zeros(u.len(), u.len());
            for s in 1..=STOREYS {
                // storey compression from its shortening
                let compression = AXIAL_STIFFNESS * (u[vertical(s - 1)] - u[vertical(s)]);
                add_spring(&mut kg, lateral(s - 1), lateral(s), -compression / HEIGHT);
            }
            Ok(kg)
        });
    Ok(system)
}

fn build_model() -> Result<AnalysisModel> {
    let mut model = AnalysisModel::new();
    model.add_material("Steel", IsotropicMaterial::steel())?;

    model.add_boundary_case(
        BoundaryCase::builder("Base")
            .description("fixed base")
            .constraints([lateral(0), vertical(0)])
            .build()?,
    )?;
    let mut gravity = BoundaryCase::builder("Gravity");
    for level in 1..=STOREYS {
        gravity = gravity.nodal_load(vertical(level), -LEVEL_MASS * 9.81);
    }
    model.add_boundary_case(gravity.build()?)?;
    model.add_boundary_case(
        BoundaryCase::builder("Wind")
            .nodal_load(lateral(STOREYS), 5.0e4)
            .nodal_load(lateral(STOREYS - 1), 3.0e4)
            .build()?,
    )?;

    let direct = DirectSolver::new(DirectMethod::ActiveColumn, StorageType::UpperSymmetricBanded1D)?;
    let iterative = IterativeSettings::new(IterativeMethod::ConjugateGradient, StorageType::CompressedRow)
        .with_preconditioner(Preconditioner::IncompleteCholesky)
        .with_tolerance(1e-10)
        .build()?;
    let subspace = SubspaceEigenSolver::new(EigenSettings::new(4, StorageType::UpperSymmetricBanded1D))?;
    let eigen = DirectEigenSolver::new(EigenSettings::new(2, StorageType::UpperSymmetricPacked))?;

    model.add_analysis(
        AnalysisCase::linear_static("1.2G + 1.0W")
            .with_solver(direct)
            .with_boundary_case("Base", 1.0)
            .with_boundary_case("Gravity", 1.2)
            .with_boundary_case("Wind", 1.0),
    )?;
    model.add_analysis(
        AnalysisCase::modal("Modes")
            .with_solver(subspace)
            .with_boundary_case("Base", 1.0),
    )?;

    // gusts at roughly the first natural frequency, 2% damping on modes 1 and 3
    let damping = RayleighDamping::from_frequencies_hz(2.0, 0.02, 10.0, 0.02)?;
    let settings = TransientSettings::new(
        400,
        0.01,
        LoadFunction::harmonic(1.0, 2.0 * std::f64::consts::PI * 2.0, 0.0)?,
        damping,
        IntegrationMethod::average_acceleration(),
    )?;
    model.add_analysis(
        AnalysisCase::linear_transient("Gusts", settings)
            .with_solver(iterative)
            .with_boundary_case("Base", 1.0)
            .with_boundary_case("Wind", 0.2),
    )?;
    model.add_analysis(
        AnalysisCase::linear_buckling("Stability")
            .with_solver(eigen)
            .with_boundary_case("Base", 1.0)
            .with_boundary_case("Gravity", 1.0),
    )?;
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== FEA Analysis Example: Three Storey Stick Model ===\n");

    let steel = build_model()?.material("Steel")?.clone();
    let d = steel.stiffness(ModelState::PlaneStress)?;
    println!("Steel plane stress stiffness D11 = {:.3e}\n", d[(0, 0)]);

    let mut model = build_model()?;
    let system = assemble()?;
    info!("assembled {} DOFs", system.dofs());

    let states = model.run_all(&system);
    for (name, state) in &states {
        println!("{:<12} {:?}", name, state);
    }
    println!();

    let statics = model
        .result("1.2G + 1.0W")?
        .as_static()
        .context("static result expected")?;
    println!("Static (1.2G + 1.0W):");
    for level in 1..=STOREYS {
        println!(
            "  L{}: DX={:.3}mm, DY={:.4}mm",
            level,
            statics.displacements[lateral(level)] * 1000.0,
            statics.displacements[vertical(level)] * 1000.0
        );
    }
    println!(
        "  Base reactions: FX={:.2}kN, FY={:.2}kN\n",
        statics.reactions[lateral(0)] / 1000.0,
        statics.reactions[vertical(0)] / 1000.0
    );

    let modal = model.result("Modes")?.as_modal().context("modal result expected")?;
    println!("Modal ({} iterations):", modal.info.iterations);
    for (i, (f, t)) in modal.frequencies.iter().zip(modal.periods()).enumerate() {
        println!("  Mode {}: f={:.3}Hz, T={:.3}s", i + 1, f, t);
    }
    println!();

    let gusts = model
        .result("Gusts")?
        .as_transient()
        .context("transient result expected")?;
    if let Some((t, peak)) = gusts.peak_displacement(lateral(STOREYS)) {
        println!(
            "Transient: roof peak {:.3}mm at t={:.2}s ({} CG iterations)\n",
            peak * 1000.0,
            t,
            gusts.solver_iterations
        );
    }

    match model.result("Stability") {
        Ok(result) => {
            let buckling = result.as_buckling().context("buckling result expected")?;
            for (i, lambda) in buckling.load_factors.iter().enumerate() {
                println!("Buckling mode {}: load factor {:.2}", i + 1, lambda);
            }
        }
        Err(_) => {
            if let Some(failure) = model.failure("Stability")? {
                println!("Buckling failed ({:?}): {}", failure.kind, failure.message);
            }
        }
    }

    println!("\n=== Analysis Complete ===");
    Ok(())
}
