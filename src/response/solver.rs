use std::path::PathBuf;

use log::{info, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ResponseError;
use crate::grid::{Grid, QProjector};
use crate::io::checkpoint;
use crate::io::ResponseConfig;
use crate::parallel::{load_balance_due, Communicator};
use crate::response::bsh::{bsh_update, BshOperators};
use crate::response::diagnostics::{property_tensor, IterationRecord};
use crate::response::logging;
use crate::response::mixer::{SlotIndex, SubspaceAccelerator};
use crate::response::operators::{
    ConvergenceTargets, GroundState, ObservableExtractor, PrecisionSchedule, Protocol,
    ResponseOperators,
};
use crate::response::residuals::{check_convergence, is_diverging, ResidualRecord};
use crate::response::state::{ActiveSet, ResponseState};
use crate::utils::{PhaseTimings, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    Converged,
    MaxIterExceeded,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverParameters {
    pub omega: f64,
    pub maxiter: usize,
    pub kain: bool,
    pub maxsub: usize,
    pub shift_margin: f64,
    pub abort_factor: f64,
    pub abort_warmup: usize,
    /// the final amplitudes are written to this file if set
    pub save_file: Option<PathBuf>,
    pub print_level: usize,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            omega: defaults::FREQUENCY,
            maxiter: defaults::MAX_ITER,
            kain: defaults::KAIN,
            maxsub: defaults::MAX_SUBSPACE,
            shift_margin: defaults::SHIFT_MARGIN,
            abort_factor: defaults::ABORT_FACTOR,
            abort_warmup: defaults::ABORT_WARMUP,
            save_file: None,
            print_level: defaults::PRINT_LEVEL,
        }
    }
}

impl From<&ResponseConfig> for SolverParameters {
    fn from(config: &ResponseConfig) -> Self {
        Self {
            omega: config.frequency,
            maxiter: config.maxiter,
            kain: config.kain,
            maxsub: config.maxsub,
            shift_margin: config.shift_margin,
            abort_factor: config.abort_factor,
            abort_warmup: config.abort_warmup,
            save_file: if config.save {
                Some(PathBuf::from(&config.save_file))
            } else {
                None
            },
            print_level: config.print_level,
        }
    }
}

impl SolverParameters {
    pub fn validate(&self) -> Result<(), ResponseError> {
        if !(self.omega >= 0.0) || !self.omega.is_finite() {
            return Err(ResponseError::invalid(
                "frequency",
                format!("{} is not a non-negative number", self.omega),
            ));
        }
        if self.kain && self.maxsub == 0 {
            return Err(ResponseError::invalid(
                "maxsub",
                "the subspace needs at least one pair",
            ));
        }
        if !(self.shift_margin > 0.0) {
            return Err(ResponseError::invalid("shift_margin", "must be positive"));
        }
        if !(self.abort_factor > 0.0) {
            return Err(ResponseError::invalid("abort_factor", "must be positive"));
        }
        Ok(())
    }

    fn is_static(&self) -> bool {
        self.omega == 0.0
    }
}

/// Outcome of one run of the response iterations.
#[derive(Debug, Clone)]
pub struct ResponseResult {
    pub status: SolverStatus,
    pub state: ResponseState,
    pub residuals: ResidualRecord,
    pub converged: Vec<bool>,
    /// iteration in which the solver stopped
    pub iterations: usize,
    pub polarizability: Array2<f64>,
    pub records: Vec<IterationRecord>,
}

impl ResponseResult {
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// Solver of the frequency-dependent response equations
///
///   x_bi = -2 G(e_i + omega) Q [V x_bi + PQ_bi]
///   y_bi = -2 G(e_i - omega) Q [V y_bi + PQ_bi]
///
/// for all perturbations `b` and occupied orbitals `i`. The iterations are accelerated
/// with one Anderson (KAIN) subspace per function, states that converged are frozen.
pub struct FrequencySolver<'a, O, E, C>
where
    O: ResponseOperators,
{
    operators: &'a O,
    extractor: &'a E,
    world: &'a C,
    grid: &'a Grid,
    pq: &'a ResponseState,
    projector: QProjector,
    bsh: BshOperators<O::Resolvent>,
    params: SolverParameters,
}

impl<'a, O, E, C> FrequencySolver<'a, O, E, C>
where
    O: ResponseOperators,
    E: ObservableExtractor,
    C: Communicator,
{
    pub fn new(
        operators: &'a O,
        extractor: &'a E,
        world: &'a C,
        ground: &GroundState,
        grid: &'a Grid,
        pq: &'a ResponseState,
        params: SolverParameters,
    ) -> Result<Self, ResponseError> {
        params.validate()?;
        ResponseError::check_shape(
            "perturbation",
            &[pq.num_states(), ground.n_orbitals(), grid.n_points()],
            &pq.shape(),
        )?;
        if pq.has_y() == params.is_static() {
            return Err(ResponseError::ShapeMismatch {
                what: "perturbation channels",
                expected: vec![if params.is_static() { 1 } else { 2 }],
                found: vec![pq.n_channels()],
            });
        }
        let projector: QProjector = QProjector::new(ground.orbitals.clone(), grid)?;
        let bsh: BshOperators<O::Resolvent> =
            BshOperators::new(operators, ground, params.omega, params.shift_margin);
        Ok(Self {
            operators,
            extractor,
            world,
            grid,
            pq,
            projector,
            bsh,
            params,
        })
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.params
    }

    pub fn shift(&self) -> f64 {
        self.bsh.shift
    }

    /// The default initial guess, a copy of the perturbation.
    pub fn initial_guess(&self) -> ResponseState {
        self.pq.clone()
    }

    /// One BSH step of the active states without acceleration.
    pub fn update_response(
        &self,
        chi: &ResponseState,
        active: &ActiveSet,
    ) -> Result<ResponseState, ResponseError> {
        bsh_update(self.operators, chi, self.pq, &self.bsh, &self.projector, active)
    }

    /// Iterates from `initial` until all states are converged to the targets of
    /// `schedule`, the maximum number of iterations is reached or the densities diverge.
    pub fn solve<S>(
        &self,
        initial: ResponseState,
        schedule: &S,
    ) -> Result<ResponseResult, ResponseError>
    where
        S: PrecisionSchedule,
    {
        let mut accelerator: Option<SubspaceAccelerator> = self.accelerator();
        self.iterate(initial, schedule, accelerator.as_mut())
    }

    fn accelerator(&self) -> Option<SubspaceAccelerator> {
        if self.params.kain {
            Some(SubspaceAccelerator::new(SlotIndex::of(self.pq), self.params.maxsub))
        } else {
            None
        }
    }

    fn iterate<S>(
        &self,
        initial: ResponseState,
        schedule: &S,
        mut accelerator: Option<&mut SubspaceAccelerator>,
    ) -> Result<ResponseResult, ResponseError>
    where
        S: PrecisionSchedule,
    {
        self.pq.check_same_layout(&initial, "initial guess")?;
        let timer: Timer = Timer::start();
        let verbose: bool = self.world.is_coordinator() && self.params.print_level > 0;
        let n_states: usize = initial.num_states();

        let mut chi: ResponseState = initial;
        let mut record: ResidualRecord = ResidualRecord::new(n_states);
        let mut converged: Vec<bool> = vec![false; n_states];
        let mut active: ActiveSet = ActiveSet::all(n_states);
        let mut rho: Array2<f64> = self.extractor.observable(&chi);
        let mut polarizability: Array2<f64> = property_tensor(&chi, self.pq, self.grid);
        let mut records: Vec<IterationRecord> = Vec::new();

        if verbose {
            logging::response_init(
                self.params.omega,
                schedule.thresh(),
                &schedule.targets(),
                self.params.maxiter,
                self.params.kain,
            );
        }

        let mut iteration: usize = 0;
        let status: SolverStatus = loop {
            let targets: ConvergenceTargets = schedule.targets();
            if load_balance_due(iteration) {
                self.world.load_balance();
            }
            if iteration > 0 {
                if is_diverging(
                    &record,
                    iteration,
                    self.params.abort_warmup,
                    self.params.abort_factor,
                    &targets,
                ) {
                    if verbose {
                        warn!(
                            "density residual {:.3e} exceeds {} x target {:.3e}",
                            record.max_density(),
                            self.params.abort_factor,
                            targets.density
                        );
                    }
                    break SolverStatus::Aborted;
                }
                converged = check_convergence(&record, &converged, &active, &targets);
                active = ActiveSet::from_converged(&converged);
                if active.is_empty() {
                    break SolverStatus::Converged;
                }
            }
            if iteration >= self.params.maxiter {
                break SolverStatus::MaxIterExceeded;
            }

            let mut timings: PhaseTimings = PhaseTimings::new();
            let candidate: ResponseState =
                timings.measure("update", || self.update_response(&chi, &active))?;
            let residual: ResponseState = candidate.sub(&chi);
            record.update_amplitude(&residual, self.grid, &active);

            // the raw BSH result is taken in the first iteration
            let next: ResponseState = match accelerator.as_deref_mut() {
                Some(kain) if iteration > 0 => timings.measure("kain", || {
                    kain.update(&chi, &residual, &active, self.grid)
                })?,
                _ => candidate,
            };
            record.update_relative(&next, self.grid, &active);

            let rho_new: Array2<f64> = timings.measure("observable", || self.extractor.observable(&next));
            ResponseError::check_shape("observable", rho.shape(), rho_new.shape())?;
            record.update_density(rho.view(), rho_new.view(), self.grid, &active);
            chi = next;
            rho = rho_new;

            polarizability = property_tensor(&chi, self.pq, self.grid);
            let iteration_record = IterationRecord {
                iteration,
                timings: timings.into_map(),
                norms: chi.norms(self.grid),
                residuals: record.amplitude.clone(),
                relative_residuals: record.relative.clone(),
                density_residuals: record.density.clone(),
                density_norms: rho.outer_iter().map(|rho_b| self.grid.norm(&rho_b)).collect(),
                active: active.to_vec(),
                polarizability: polarizability.clone(),
                residual_polarizability: property_tensor(&residual, self.pq, self.grid),
            };
            if verbose {
                logging::response_iteration(
                    iteration,
                    active.len(),
                    record.relative.view(),
                    record.density.view(),
                    timer.elapsed_secs(),
                );
                if self.params.print_level > 1 {
                    logging::state_residuals(
                        iteration_record.norms.view(),
                        record.relative.view(),
                        record.density.view(),
                    );
                }
            }
            records.push(iteration_record);
            iteration += 1;
        };

        if let Some(path) = self.params.save_file.as_ref() {
            checkpoint::save(self.world, path, &chi)?;
        }
        if verbose {
            logging::response_end(&timer, status, iteration, polarizability.view());
        }
        Ok(ResponseResult {
            status,
            state: chi,
            residuals: record,
            converged,
            iterations: iteration,
            polarizability,
            records,
        })
    }

    /// Runs the solver for every stage of the precision protocol. Each stage starts from
    /// the amplitudes of the previous one with an emptied subspace. A diverging stage
    /// ends the protocol.
    pub fn solve_protocol(
        &self,
        initial: ResponseState,
        stages: &[Protocol],
    ) -> Result<Vec<ResponseResult>, ResponseError> {
        if stages.is_empty() {
            return Err(ResponseError::invalid(
                "protocol",
                "at least one threshold is required",
            ));
        }
        let mut results: Vec<ResponseResult> = Vec::with_capacity(stages.len());
        let mut accelerator: Option<SubspaceAccelerator> = self.accelerator();
        let mut guess: ResponseState = initial;
        for stage in stages.iter() {
            if self.world.is_coordinator() && self.params.print_level > 0 {
                info!("{: <25} {:.1e}", "protocol threshold:", stage.thresh);
            }
            if let Some(kain) = accelerator.as_mut() {
                kain.reset();
            }
            let result: ResponseResult = self.iterate(guess, stage, accelerator.as_mut())?;
            guess = result.state.clone();
            let status: SolverStatus = result.status;
            results.push(result);
            if status == SolverStatus::Aborted {
                warn!("protocol stopped at threshold {:.1e}", stage.thresh);
                break;
            }
        }
        Ok(results)
    }
}
