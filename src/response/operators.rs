//! Interfaces of the collaborators that the response solver consumes.
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ResponseError;
use crate::grid::Grid;
use crate::response::state::ResponseState;

/// Kind of the ground state calculation. It decides which terms enter the
/// response kernel and is resolved once when the operators are set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcType {
    Hartree,
    Hf,
    Dft,
}

/// Family of bound-state Green's function operators, one per occupied orbital.
///
/// The family is built for a fixed energy shift and frequency, the operator of orbital
/// `i` is `G(e_i + omega + shift)`.
pub trait ResolventFamily: Sync {
    fn apply(&self, orbital: usize, f: ArrayView1<f64>) -> Array1<f64>;
}

/// Provides the effective action of the response Hamiltonian and the resolvent operators.
pub trait ResponseOperators {
    type Resolvent: ResolventFamily;

    /// Applies the response operator (potential and kernel terms, without the kinetic
    /// energy) to every function of `chi`. The result must have the layout of `chi`.
    fn effective_action(&self, chi: &ResponseState) -> ResponseState;

    fn resolvent_family(&self, shift: f64, omega: f64) -> Self::Resolvent;
}

/// Maps a response state to the physical observable (the response densities, one row
/// per state) that is compared between iterations.
pub trait ObservableExtractor {
    fn observable(&self, chi: &ResponseState) -> Array2<f64>;
}

/// Ground state data consumed by the response calculation.
#[derive(Debug, Clone)]
pub struct GroundState {
    /// occupied orbitals, shape `(n, n_points)`
    pub orbitals: Array2<f64>,
    /// occupied orbital energies
    pub energies: Array1<f64>,
}

impl GroundState {
    pub fn new(orbitals: Array2<f64>, energies: Array1<f64>) -> Result<Self, ResponseError> {
        ResponseError::check_shape(
            "orbital energies",
            &[orbitals.nrows()],
            energies.shape(),
        )?;
        Ok(Self { orbitals, energies })
    }

    pub fn n_orbitals(&self) -> usize {
        self.orbitals.nrows()
    }

    /// Energy of the least bound occupied orbital.
    pub fn homo_energy(&self) -> f64 {
        self.energies
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Response densities `rho_b = sum_i phi_i * (x_bi + y_bi)` with `y = x` in the static case.
pub struct TransitionDensity {
    orbitals: Array2<f64>,
}

impl TransitionDensity {
    pub fn new(ground: &GroundState) -> Self {
        Self {
            orbitals: ground.orbitals.clone(),
        }
    }
}

impl ObservableExtractor for TransitionDensity {
    fn observable(&self, chi: &ResponseState) -> Array2<f64> {
        transition_density(self.orbitals.view(), chi)
    }
}

pub fn transition_density(orbitals: ArrayView2<f64>, chi: &ResponseState) -> Array2<f64> {
    let mut rho: Array2<f64> = Array2::zeros((chi.num_states(), chi.n_points()));
    let y: ArrayView3<f64> = chi.y_or_x();
    for (b, mut rho_b) in rho.outer_iter_mut().enumerate() {
        for (i, phi) in orbitals.outer_iter().enumerate() {
            let pair: Array1<f64> = &chi.x.slice(s![b, i, ..]) + &y.slice(s![b, i, ..]);
            rho_b += &(&phi * &pair);
        }
    }
    rho
}

/// Convergence targets of the current precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceTargets {
    /// target of the amplitude residual relative to the amplitude norm
    pub relative: f64,
    /// target of the density residual
    pub density: f64,
}

impl ConvergenceTargets {
    /// Targets derived from the truncation threshold, the requested density convergence
    /// and the size of the molecule.
    pub fn from_threshold(thresh: f64, dconv: f64, n_atoms: usize) -> Self {
        let dconv: f64 = (thresh * defaults::DENSITY_THRESH_FACTOR).max(dconv);
        let density: f64 = dconv * n_atoms.max(defaults::MIN_ATOMS_DENSITY_TARGET) as f64;
        let relative: f64 = thresh.powf(defaults::RELATIVE_TARGET_EXPONENT)
            * 10.0_f64.powf(defaults::RELATIVE_TARGET_PREFACTOR_EXPONENT);
        Self { relative, density }
    }
}

/// Supplies the current discretization threshold and the targets derived from it.
/// The solver asks for the targets in every iteration.
pub trait PrecisionSchedule {
    fn thresh(&self) -> f64;
    fn targets(&self) -> ConvergenceTargets;
}

/// One stage of the precision protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Protocol {
    pub thresh: f64,
    pub dconv: f64,
    pub n_atoms: usize,
}

impl PrecisionSchedule for Protocol {
    fn thresh(&self) -> f64 {
        self.thresh
    }

    fn targets(&self) -> ConvergenceTargets {
        ConvergenceTargets::from_threshold(self.thresh, self.dconv, self.n_atoms)
    }
}

/// Builds the right hand side `PQ[b][i] = Q(v_b * phi_i)` from the perturbing operators
/// `v_b` (one row per perturbation). Both channels of the result carry the same functions
/// if `with_y` is set.
pub fn project_perturbation(
    operators: ArrayView2<f64>,
    ground: &GroundState,
    grid: &Grid,
    with_y: bool,
) -> Result<ResponseState, ResponseError> {
    ResponseError::check_shape(
        "perturbing operators",
        &[operators.nrows(), grid.n_points()],
        operators.shape(),
    )?;
    let projector = crate::grid::QProjector::new(ground.orbitals.clone(), grid)?;
    let mut x: Array3<f64> =
        Array3::zeros((operators.nrows(), ground.n_orbitals(), grid.n_points()));
    for (b, v_b) in operators.outer_iter().enumerate() {
        for (i, phi) in ground.orbitals.outer_iter().enumerate() {
            let product: Array1<f64> = &v_b * &phi;
            x.slice_mut(s![b, i, ..]).assign(&projector.apply(&product));
        }
    }
    let y: Option<Array3<f64>> = if with_y { Some(x.clone()) } else { None };
    ResponseState::from_channels(x, y)
}
