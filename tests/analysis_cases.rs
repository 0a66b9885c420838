use std::collections::BTreeMap;

use approx::assert_relative_eq;
use fea_analysis::prelude::*;

/// Fixed-free chain of `n` springs (k = 1000) with unit masses; DOF 0 is the wall
fn chain(n: usize) -> StructuralSystem {
    let mut k = Mat::zeros(n + 1, n + 1);
    for s in 0..n {
        let (i, j) = (s, s + 1);
        k[(i, i)] += 1000.0;
        k[(j, j)] += 1000.0;
        k[(i, j)] -= 1000.0;
        k[(j, i)] -= 1000.0;
    }
    StructuralSystem::new(k)
        .unwrap()
        .with_mass(Mat::identity(n + 1, n + 1))
        .unwrap()
}

fn boundary_cases(n: usize) -> BTreeMap<String, BoundaryCase> {
    let mut cases = BTreeMap::new();
    let wall = BoundaryCase::builder("Wall").constraint(0).build().unwrap();
    let tip = BoundaryCase::builder("Tip").nodal_load(n, 10.0).build().unwrap();
    cases.insert("Wall".to_string(), wall);
    cases.insert("Tip".to_string(), tip);
    cases
}

#[test]
fn modal_without_boundary_cases_fails() {
    let solver = SubspaceEigenSolver::new(EigenSettings::new(2, StorageType::UpperSymmetricPacked)).unwrap();
    let mut analysis = Analysis::new(AnalysisCase::modal("Modes").with_solver(solver)).unwrap();
    assert_eq!(analysis.state(), AnalysisState::Configured);

    let err = analysis.run(&boundary_cases(5), &chain(5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
    assert_eq!(analysis.state(), AnalysisState::Failed);
    assert_eq!(
        analysis.failure().unwrap().kind,
        ErrorKind::IncompatibleConfiguration
    );
}

#[test]
fn modal_with_constraint_only_case_solves() {
    let solver = SubspaceEigenSolver::new(EigenSettings::new(2, StorageType::UpperSymmetricPacked)).unwrap();
    let mut analysis = Analysis::new(
        AnalysisCase::modal("Modes")
            .with_solver(solver)
            .with_boundary_case("Wall", 1.0),
    )
    .unwrap();
    let result = analysis.run(&boundary_cases(5), &chain(5)).unwrap();
    let modal = result.as_modal().unwrap();

    // lambda_i = 4k sin^2((2i - 1) pi / (2 (2n + 1)))
    let exact = 4000.0 * (std::f64::consts::PI / 22.0).sin().powi(2);
    assert_relative_eq!(modal.eigenvalues[0], exact, max_relative = 1e-8);
    assert_eq!(analysis.state(), AnalysisState::Solved);
}

#[test]
fn iterative_solver_out_of_iterations() {
    let solver = IterativeSettings::new(IterativeMethod::ConjugateGradient, StorageType::CompressedRow)
        .with_max_iterations(1)
        .build()
        .unwrap();
    let mut analysis = Analysis::new(
        AnalysisCase::linear_static("Static")
            .with_solver(solver)
            .with_boundary_case("Wall", 1.0)
            .with_boundary_case("Tip", 1.0),
    )
    .unwrap();
    let err = analysis.run(&boundary_cases(10), &chain(10)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SolverNonConvergence);
    assert_eq!(analysis.state(), AnalysisState::Failed);
}

#[test]
fn every_linear_solver_agrees_on_static_response() {
    let n = 12;
    let mut solvers: Vec<Solver> = Vec::new();
    for method in [
        IterativeMethod::ConjugateGradient,
        IterativeMethod::ConjugateGradientSquared,
        IterativeMethod::BiConjugateGradient,
        IterativeMethod::BiConjugateGradientStabilized,
        IterativeMethod::QuasiMinimalResidual,
        IterativeMethod::Gmres,
        IterativeMethod::IterativeRefinement,
    ] {
        for storage in [StorageType::CompressedDiagonal, StorageType::CompressedRow] {
            let preconditioner = if method == IterativeMethod::IterativeRefinement {
                Preconditioner::IncompleteCholesky
            } else {
                Preconditioner::Diagonal
            };
            solvers.push(
                IterativeSettings::new(method, storage)
                    .with_preconditioner(preconditioner)
                    .with_tolerance(1e-12)
                    .with_max_iterations(500)
                    .build()
                    .unwrap()
                    .into(),
            );
        }
    }
    solvers.push(DirectSolver::new(DirectMethod::ActiveColumn, StorageType::UpperSymmetricBanded1D).unwrap().into());
    solvers.push(DirectSolver::new(DirectMethod::GaussSymmetric, StorageType::UpperSymmetricPacked).unwrap().into());
    solvers.push(DirectSolver::new(DirectMethod::GaussSymmetric, StorageType::UpperSymmetricBanded2D).unwrap().into());

    for solver in solvers {
        let mut analysis = Analysis::new(
            AnalysisCase::linear_static("Static")
                .with_solver(solver)
                .with_boundary_case("Wall", 1.0)
                .with_boundary_case("Tip", 2.0),
        )
        .unwrap();
        let result = analysis.run(&boundary_cases(n), &chain(n)).unwrap();
        let statics = result.as_static().unwrap();
        // 20 through 12 springs of 1000
        assert_relative_eq!(statics.displacements[n], 0.24, max_relative = 1e-8);
        assert_relative_eq!(statics.reactions[0], -20.0, max_relative = 1e-8);
    }
}

#[test]
fn linear_solver_rejected_for_modal() {
    let solver = DirectSolver::new(DirectMethod::ActiveColumn, StorageType::UpperSymmetricBanded1D).unwrap();
    let mut analysis = Analysis::new(AnalysisCase::modal("Modes")).unwrap();
    let err = analysis.set_solver(solver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
    assert_eq!(analysis.state(), AnalysisState::Unconfigured);

    let bad = AnalysisCase::linear_buckling("Buckling").with_solver(solver);
    assert!(Analysis::new(bad).is_err());
}

#[test]
fn transient_ramp_approaches_static_deflection() {
    let n = 3;
    // slow ramp to full load then hold, heavily damped
    let ramp = LoadFunction::table(vec![(0.0, 0.0), (2.0, 1.0), (10.0, 1.0)]).unwrap();
    let damping = RayleighDamping::new(5.0, 0.0).unwrap();
    let settings = TransientSettings::new(
        1000,
        0.01,
        ramp,
        damping,
        IntegrationMethod::newmark(0.25, 0.5).unwrap(),
    )
    .unwrap();
    let solver = DirectSolver::new(DirectMethod::GaussSymmetric, StorageType::UpperSymmetricBanded2D).unwrap();

    let mut model = AnalysisModel::new();
    for case in boundary_cases(n).into_values() {
        model.add_boundary_case(case).unwrap();
    }
    model
        .add_analysis(
            AnalysisCase::linear_transient("Ramp", settings)
                .with_solver(solver)
                .with_boundary_case("Wall", 1.0)
                .with_boundary_case("Tip", 1.0),
        )
        .unwrap();
    model.run("Ramp", &chain(n)).unwrap();

    let transient = model.result("Ramp").unwrap().as_transient().unwrap();
    assert_eq!(transient.num_steps(), 1000);
    let tip = transient.displacement_history(n);
    assert_eq!(tip[0], 0.0);
    // 10 through 3 springs of 1000
    assert_relative_eq!(tip[1000], 0.03, max_relative = 1e-3);
}

#[test]
fn transient_load_function_must_cover_grid() {
    let short = LoadFunction::table(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap();
    let err = TransientSettings::new(
        200,
        0.01,
        short,
        RayleighDamping::undamped(),
        IntegrationMethod::average_acceleration(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
}

#[test]
fn combination_scales_loads_and_unions_constraints() {
    let a = BoundaryCase::builder("A")
        .constraint(0)
        .nodal_load(2, 1.0)
        .build()
        .unwrap();
    let b = BoundaryCase::builder("B")
        .constraint(1)
        .nodal_load(2, 4.0)
        .displacement(3, 0.1)
        .build()
        .unwrap();
    let combined = combine(&[(&a, 2.0), (&b, 0.5)]).unwrap();
    assert_eq!(combined.prescribed_dofs(), vec![0, 1, 3]);
    assert_relative_eq!(combined.load_vector(4)[2], 4.0);
    assert_relative_eq!(combined.prescribed_values(4)[3], 0.05);

    let err = combine(&[(&a, 1.0), (&a, 1.0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
}

#[test]
fn model_json_round_trip_keeps_configuration() {
    let mut model = AnalysisModel::new();
    model.add_material("Steel", IsotropicMaterial::steel()).unwrap();
    for case in boundary_cases(4).into_values() {
        model.add_boundary_case(case).unwrap();
    }
    let solver = IterativeSettings::new(IterativeMethod::Gmres, StorageType::CompressedDiagonal)
        .with_preconditioner(Preconditioner::IncompleteLU)
        .with_restart(5)
        .build()
        .unwrap();
    model
        .add_analysis(
            AnalysisCase::linear_static("Static")
                .with_solver(solver)
                .with_boundary_case("Wall", 1.0)
                .with_boundary_case("Tip", 1.0),
        )
        .unwrap();

    let json = model.to_json().unwrap();
    let mut restored = AnalysisModel::from_json(&json).unwrap();
    assert_eq!(restored.analysis("Static").unwrap().case(), model.analysis("Static").unwrap().case());

    restored.run("Static", &chain(4)).unwrap();
    let statics = restored.result("Static").unwrap().as_static().unwrap();
    assert_relative_eq!(statics.displacements[4], 0.04, max_relative = 1e-8);
}

#[test]
fn buckling_through_the_model() {
    // axial chain DOFs 0..=2 and one lateral DOF 3 restrained by a spring of 30
    let mut k = Mat::zeros(4, 4);
    for (i, j) in [(0, 1), (1, 2)] {
        k[(i, i)] += 1000.0;
        k[(j, j)] += 1000.0;
        k[(i, j)] -= 1000.0;
        k[(j, i)] -= 1000.0;
    }
    k[(3, 3)] = 30.0;
    let system = StructuralSystem::new(k)
        .unwrap()
        .with_geometric_stiffness(|u: &FEVec| -> FEAResult<Mat> {
            let mut kg = Mat::zeros(4, 4);
            // compression in the upper bar softens the lateral spring
            kg[(3, 3)] = -1000.0 * (u[2] - u[1]);
            Ok(kg)
        });

    let mut model = AnalysisModel::new();
    model
        .add_boundary_case(BoundaryCase::builder("Base").constraint(0).build().unwrap())
        .unwrap();
    model
        .add_boundary_case(BoundaryCase::builder("Push").nodal_load(2, 3.0).build().unwrap())
        .unwrap();
    let solver = SubspaceEigenSolver::new(EigenSettings::new(1, StorageType::UpperSymmetricBanded1D)).unwrap();
    model
        .add_analysis(
            AnalysisCase::linear_buckling("Buckling")
                .with_solver(solver)
                .with_boundary_case("Base", 1.0)
                .with_boundary_case("Push", 1.0),
        )
        .unwrap();
    model.run("Buckling", &system).unwrap();

    // N = 3 gives K_G = -3, so lambda = 30 / 3
    let buckling = model.result("Buckling").unwrap().as_buckling().unwrap();
    assert_relative_eq!(buckling.critical_load_factor().unwrap(), 10.0, max_relative = 1e-8);
}
