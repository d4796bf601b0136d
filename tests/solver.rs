mod common;

use approx::assert_abs_diff_eq;
use common::{max, BlockSystem, FixedTargets, InflatingDensity};
use frequency_response::io::checkpoint;
use frequency_response::parallel::SerialWorld;
use frequency_response::response::{
    ActiveSet, ConvergenceTargets, FrequencySolver, PrecisionSchedule, Protocol, ResponseResult,
    ResponseState, SolverParameters, SolverStatus, TransitionDensity,
};
use frequency_response::ResponseError;
use ndarray::prelude::*;

fn parameters(omega: f64, maxiter: usize, kain: bool) -> SolverParameters {
    SolverParameters {
        omega,
        maxiter,
        kain,
        ..SolverParameters::default()
    }
}

fn tight() -> Protocol {
    Protocol {
        thresh: 1.0e-6,
        dconv: 1.0e-4,
        n_atoms: 1,
    }
}

#[test]
fn converges_to_the_exact_solution() {
    let _ = env_logger::builder().is_test(true).try_init();
    let system = BlockSystem::analytic();
    for &omega in [0.0, 0.1].iter() {
        for &kain in [true, false].iter() {
            let pq: ResponseState = system.perturbation(omega != 0.0);
            let density: TransitionDensity = system.density();
            let world = SerialWorld::new();
            let solver = FrequencySolver::new(
                &system.model,
                &density,
                &world,
                &system.ground,
                &system.grid,
                &pq,
                parameters(omega, 25, kain),
            )
            .unwrap();
            let result: ResponseResult = solver.solve(solver.initial_guess(), &tight()).unwrap();
            assert_eq!(result.status, SolverStatus::Converged, "omega: {}, kain: {}", omega, kain);
            let exact: ResponseState = system.exact(omega);
            assert!(
                result.state.x.abs_diff_eq(&exact.x, 1.0e-3),
                "omega: {}, kain: {}, x: {}, exact: {}",
                omega,
                kain,
                result.state.x,
                exact.x
            );
            if let (Some(y), Some(y_exact)) = (result.state.y.as_ref(), exact.y.as_ref()) {
                assert!(y.abs_diff_eq(y_exact, 1.0e-3));
            }
            assert!(world.load_balance_count() >= 1);
        }
    }
}

#[test]
fn static_response_has_no_y_channel() {
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(false);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        parameters(0.0, 25, true),
    )
    .unwrap();
    let result: ResponseResult = solver.solve(solver.initial_guess(), &tight()).unwrap();
    assert!(result.state.y.is_none());
    assert!(result.records.iter().all(|r| r.norms.len() == 2));

    // alpha = -4 <x|PQ> with x = -PQ / (t + v - e)
    let h: f64 = 1.0 - 0.3 + 0.5;
    let overlap: Array2<f64> = pq.inner(&pq, &system.grid);
    let expected: Array2<f64> = overlap * (4.0 / h);
    assert!(result.polarizability.abs_diff_eq(&expected, 1.0e-3 * max(expected.diag())));
    let direct: Array2<f64> = result.state.inner(&pq, &system.grid) * -4.0;
    assert!(result.polarizability.abs_diff_eq(&direct, 1.0e-12));
}

#[test]
fn dynamic_response_requires_both_channels() {
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(false);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        parameters(0.1, 25, true),
    );
    assert!(matches!(solver, Err(ResponseError::ShapeMismatch { .. })));
}

#[test]
fn first_iteration_takes_the_raw_update() {
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(true);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        parameters(0.1, 1, true),
    )
    .unwrap();
    let result: ResponseResult = solver.solve(solver.initial_guess(), &tight()).unwrap();
    assert_eq!(result.status, SolverStatus::MaxIterExceeded);
    assert_eq!(result.iterations, 1);
    let candidate: ResponseState = solver.update_response(&pq, &ActiveSet::all(2)).unwrap();
    assert!(result.state.x.abs_diff_eq(&candidate.x, 1.0e-15));
    assert!(result
        .state
        .y
        .as_ref()
        .unwrap()
        .abs_diff_eq(candidate.y.as_ref().unwrap(), 1.0e-15));
}

#[test]
fn converged_states_are_frozen() {
    let system = BlockSystem::analytic();
    let omega: f64 = 0.1;
    let pq: ResponseState = system.perturbation(true);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        parameters(omega, 25, true),
    )
    .unwrap();
    // the first state starts at its solution
    let exact: ResponseState = system.exact(omega);
    let mut initial: ResponseState = pq.clone();
    initial.copy_states_from(&exact, vec![0]);
    let targets = FixedTargets(ConvergenceTargets {
        relative: 1.0e-8,
        density: 1.0e-8,
    });
    let result: ResponseResult = solver.solve(initial, &targets).unwrap();

    assert_eq!(result.status, SolverStatus::Converged);
    assert_eq!(result.records[0].active, vec![0, 1]);
    assert_eq!(result.records[1].active, vec![1]);
    for pair in result.records.windows(2) {
        assert!(pair[1].active.len() <= pair[0].active.len());
    }
    assert!(result.converged.iter().all(|c| *c));
    let x0_after_first: Array2<f64> = result.state.x.slice(s![0, .., ..]).to_owned();
    assert!(x0_after_first.abs_diff_eq(&exact.x.slice(s![0, .., ..]), 1.0e-12));
}

#[test]
fn acceleration_beats_plain_iteration() {
    // slowly contracting on both blocks: 0.8 on the orbital block, 0.6 on the other one
    let system = BlockSystem::new([0.5, 1.0], [-0.8, -0.9], -0.5);
    let pq: ResponseState = system.perturbation(false);
    let density: TransitionDensity = system.density();
    let mut initial: ResponseState = pq.clone();
    initial.x.slice_mut(s![.., .., 4..]).fill(1.0);
    let targets = FixedTargets(ConvergenceTargets {
        relative: 0.0,
        density: 1.0e3,
    });

    let run = |kain: bool| -> ResponseResult {
        let world = SerialWorld::new();
        let solver = FrequencySolver::new(
            &system.model,
            &density,
            &world,
            &system.ground,
            &system.grid,
            &pq,
            parameters(0.0, 6, kain),
        )
        .unwrap();
        solver.solve(initial.clone(), &targets).unwrap()
    };
    let plain: ResponseResult = run(false);
    let accelerated: ResponseResult = run(true);
    assert_eq!(plain.status, SolverStatus::MaxIterExceeded);
    assert_eq!(accelerated.status, SolverStatus::MaxIterExceeded);

    let plain_last = &plain.records.last().unwrap().relative_residuals;
    let accelerated_last = &accelerated.records.last().unwrap().relative_residuals;
    for b in 0..2 {
        assert!(
            accelerated_last[b] < 1.0e-3 * plain_last[b],
            "state {}: accelerated {:e}, plain {:e}",
            b,
            accelerated_last[b],
            plain_last[b]
        );
    }
}

#[test]
fn diverging_densities_abort() {
    let dir = tempfile::tempdir().unwrap();
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(false);
    let targets = FixedTargets(ConvergenceTargets {
        relative: 0.0,
        density: 1.0,
    });
    // the observable of iteration k is the (k + 1)-th call
    for &(from, status, iterations) in [
        (6, SolverStatus::Aborted, 6),
        (usize::MAX, SolverStatus::MaxIterExceeded, 12),
    ]
    .iter()
    {
        let density = InflatingDensity::new(system.density(), from);
        let world = SerialWorld::new();
        let path = dir.path().join(format!("restart_{:?}.npz", status));
        let mut params: SolverParameters = parameters(0.0, 12, false);
        params.save_file = Some(path.clone());
        let solver = FrequencySolver::new(
            &system.model,
            &density,
            &world,
            &system.ground,
            &system.grid,
            &pq,
            params,
        )
        .unwrap();
        let result: ResponseResult = solver.solve(solver.initial_guess(), &targets).unwrap();
        assert_eq!(result.status, status);
        assert_eq!(result.iterations, iterations);
        // the last amplitudes are kept even if the iteration diverged
        let restored: ResponseState = checkpoint::load(&world, &path, 2, 1).unwrap();
        assert_eq!(restored, result.state);
    }
}

#[test]
fn final_state_is_checkpointed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart_response.npz");
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(true);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let mut params: SolverParameters = parameters(0.1, 3, true);
    params.save_file = Some(path.clone());
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        params,
    )
    .unwrap();
    let result: ResponseResult = solver.solve(solver.initial_guess(), &tight()).unwrap();
    let restored: ResponseState = checkpoint::load(&world, &path, 2, 1).unwrap();
    assert_eq!(restored, result.state);
}

#[test]
fn protocol_reuses_the_previous_stage() {
    let system = BlockSystem::analytic();
    let pq: ResponseState = system.perturbation(true);
    let density: TransitionDensity = system.density();
    let world = SerialWorld::new();
    let solver = FrequencySolver::new(
        &system.model,
        &density,
        &world,
        &system.ground,
        &system.grid,
        &pq,
        parameters(0.1, 25, true),
    )
    .unwrap();
    let stages: Vec<Protocol> = [1.0e-4, 1.0e-6]
        .iter()
        .map(|thresh| Protocol {
            thresh: *thresh,
            dconv: 1.0e-4,
            n_atoms: 1,
        })
        .collect();
    let results: Vec<ResponseResult> = solver.solve_protocol(solver.initial_guess(), &stages).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_converged()));
    let first: f64 = max(results[0].records[0].relative_residuals.view());
    let second: f64 = max(results[1].records[0].relative_residuals.view());
    assert!(second < first, "first stage: {:e}, second stage: {:e}", first, second);
    assert!(max(results[1].residuals.relative.view()) < stages[1].targets().relative);

    assert!(matches!(
        solver.solve_protocol(solver.initial_guess(), &[]),
        Err(ResponseError::InvalidParameter { .. })
    ));
    assert_abs_diff_eq!(solver.shift(), 0.0);
}
