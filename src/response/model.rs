//! One-dimensional model system that provides the response operators on a grid.
//!
//! The Hamiltonian is diagonal on the grid: a non-negative kinetic profile `t(x)` and a
//! local potential `v(x)`. The bound-state Green's function of orbital `i` is therefore
//! `G(E) f = f / (2 (t - E))` point by point. The response kernel couples the orbitals
//! through the response density and depends on the kind of calculation.
use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ResponseError;
use crate::grid::Grid;
use crate::io::ModelConfig;
use crate::response::operators::{
    project_perturbation, transition_density, CalcType, GroundState, ResolventFamily,
    ResponseOperators,
};
use crate::response::state::ResponseState;

/// Prefactors of the kernel terms, resolved once from the calculation type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseKernel {
    /// Coulomb-like term `phi_i * rho_b`
    pub coulomb: f64,
    /// exchange-like term `-sum_j phi_j * phi_i * chi_bj`
    pub exchange: f64,
    /// local xc term `phi_i * rho_0 * rho_b`
    pub xc: f64,
}

impl ResponseKernel {
    pub fn new(calc_type: CalcType, strength: f64) -> Self {
        match calc_type {
            CalcType::Hartree => Self {
                coulomb: strength,
                exchange: 0.0,
                xc: 0.0,
            },
            CalcType::Hf => Self {
                coulomb: strength,
                exchange: defaults::EXCHANGE_FRACTION_HF * strength,
                xc: 0.0,
            },
            CalcType::Dft => Self {
                coulomb: strength,
                exchange: 0.0,
                xc: defaults::XC_KERNEL_WEIGHT * strength,
            },
        }
    }

    pub fn none() -> Self {
        Self {
            coulomb: 0.0,
            exchange: 0.0,
            xc: 0.0,
        }
    }
}

pub struct GridModel {
    kinetic: Array1<f64>,
    potential: Array1<f64>,
    orbitals: Array2<f64>,
    energies: Array1<f64>,
    // coulomb + xc * rho_0
    density_kernel: Array1<f64>,
    exchange: f64,
}

impl GridModel {
    pub fn new(
        kinetic: Array1<f64>,
        potential: Array1<f64>,
        ground: &GroundState,
        kernel: ResponseKernel,
    ) -> Result<Self, ResponseError> {
        let n_points: usize = ground.orbitals.ncols();
        ResponseError::check_shape("kinetic profile", &[n_points], kinetic.shape())?;
        ResponseError::check_shape("potential", &[n_points], potential.shape())?;
        if kinetic.iter().any(|t| !(*t >= 0.0)) {
            return Err(ResponseError::invalid(
                "kinetic",
                "the kinetic profile must be non-negative",
            ));
        }
        let ground_density: Array1<f64> = ground.orbitals.mapv(|phi| phi * phi).sum_axis(Axis(0));
        let density_kernel: Array1<f64> = ground_density.mapv(|rho| kernel.coulomb + kernel.xc * rho);
        Ok(Self {
            kinetic,
            potential,
            orbitals: ground.orbitals.clone(),
            energies: ground.energies.clone(),
            density_kernel,
            exchange: kernel.exchange,
        })
    }

    fn apply_channel(&self, channel: ArrayView3<f64>, rho: &Array2<f64>) -> Array3<f64> {
        let mut result: Array3<f64> = Array3::zeros(channel.raw_dim());
        for (b, mut result_b) in result.outer_iter_mut().enumerate() {
            let local: Array1<f64> = &rho.row(b) * &self.density_kernel;
            for (i, phi_i) in self.orbitals.outer_iter().enumerate() {
                let mut f: Array1<f64> = &self.potential * &channel.slice(s![b, i, ..]);
                f += &(&phi_i * &local);
                if self.exchange != 0.0 {
                    for (j, phi_j) in self.orbitals.outer_iter().enumerate() {
                        let pair: Array1<f64> = &phi_j * &phi_i;
                        f.scaled_add(-self.exchange, &(&pair * &channel.slice(s![b, j, ..])));
                    }
                }
                result_b.row_mut(i).assign(&f);
            }
        }
        result
    }
}

/// `G(e_i + omega + shift)` for every occupied orbital.
pub struct ModelResolvent {
    kinetic: Array1<f64>,
    energies: Array1<f64>,
}

impl ResolventFamily for ModelResolvent {
    fn apply(&self, orbital: usize, f: ArrayView1<f64>) -> Array1<f64> {
        let e: f64 = self.energies[orbital];
        Zip::from(f)
            .and(&self.kinetic)
            .map_collect(|f, t| f / (2.0 * (t - e)))
    }
}

impl ResponseOperators for GridModel {
    type Resolvent = ModelResolvent;

    fn effective_action(&self, chi: &ResponseState) -> ResponseState {
        let rho: Array2<f64> = transition_density(self.orbitals.view(), chi);
        ResponseState {
            x: self.apply_channel(chi.x.view(), &rho),
            y: chi.y.as_ref().map(|y| self.apply_channel(y.view(), &rho)),
        }
    }

    fn resolvent_family(&self, shift: f64, omega: f64) -> ModelResolvent {
        ModelResolvent {
            kinetic: self.kinetic.clone(),
            energies: self.energies.mapv(|e| e + omega + shift),
        }
    }
}

/// Form of the perturbing operators of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerturbationKind {
    /// multipole-like operators `x^(b+1)`
    Dipole,
    /// derivatives of the model potential with respect to a displacement of its center,
    /// `d^(b+1)/dX^(b+1) v(x - X)` at `X = 0`
    Potential,
}

impl PerturbationKind {
    /// One row per state on the grid `coordinates`.
    pub fn operators(self, coordinates: ArrayView1<f64>, n_states: usize, depth: f64) -> Array2<f64> {
        let mut operators: Array2<f64> = Array2::zeros((n_states, coordinates.len()));
        for (k, &x) in coordinates.iter().enumerate() {
            match self {
                PerturbationKind::Dipole => {
                    for b in 0..n_states {
                        operators[[b, k]] = x.powi(b as i32 + 1);
                    }
                }
                PerturbationKind::Potential => {
                    // d^n/dX^n [-depth exp(-(x - X)^2)] = -depth H_n(x) exp(-x^2) at X = 0
                    let gaussian: f64 = -depth * (-x * x).exp();
                    let (mut h_prev, mut h): (f64, f64) = (1.0, 2.0 * x);
                    for b in 0..n_states {
                        operators[[b, k]] = gaussian * h;
                        let n: f64 = (b + 1) as f64;
                        let h_next: f64 = 2.0 * x * h - 2.0 * n * h_prev;
                        h_prev = h;
                        h = h_next;
                    }
                }
            }
        }
        operators
    }
}

/// Everything needed to run the response of the model system.
pub struct ModelProblem {
    pub grid: Grid,
    pub ground: GroundState,
    pub model: GridModel,
    /// perturbing operators, one row per state
    pub perturbations: Array2<f64>,
}

impl ModelProblem {
    pub fn from_config(config: &ModelConfig, calc_type: CalcType) -> Result<Self, ResponseError> {
        if config.n_points == 0 || !(config.box_length > 0.0) {
            return Err(ResponseError::invalid(
                "model",
                "the grid needs points and a positive box length",
            ));
        }
        let n_orbitals: usize = config.orbital_energies.len();
        if n_orbitals == 0 || n_orbitals >= config.n_points {
            return Err(ResponseError::invalid(
                "orbital_energies",
                format!("{} orbitals on {} grid points", n_orbitals, config.n_points),
            ));
        }
        let spacing: f64 = config.box_length / config.n_points as f64;
        let grid: Grid = Grid::uniform(config.n_points, spacing)?;
        let coordinates: Array1<f64> = Array1::from_shape_fn(config.n_points, |k| {
            -0.5 * config.box_length + (k as f64 + 0.5) * spacing
        });

        let orbitals: Array2<f64> =
            gaussian_orbitals(coordinates.view(), n_orbitals, config.orbital_exponent, &grid)?;
        let ground: GroundState =
            GroundState::new(orbitals, Array1::from(config.orbital_energies.clone()))?;

        let kinetic: Array1<f64> = coordinates.mapv(|x| 0.5 * x * x);
        let potential: Array1<f64> = coordinates.mapv(|x| -config.potential_depth * (-x * x).exp());
        let kernel: ResponseKernel = ResponseKernel::new(calc_type, config.kernel_strength);
        debug!("model kernel for {:?}: {:?}", calc_type, kernel);
        let model: GridModel = GridModel::new(kinetic, potential, &ground, kernel)?;

        let perturbations: Array2<f64> =
            config
                .perturbation
                .operators(coordinates.view(), config.n_states, config.potential_depth);
        Ok(Self {
            grid,
            ground,
            model,
            perturbations,
        })
    }

    /// Right hand side `Q(v_b * phi_i)`, with a Y channel for non-zero frequencies.
    pub fn perturbation(&self, with_y: bool) -> Result<ResponseState, ResponseError> {
        project_perturbation(self.perturbations.view(), &self.ground, &self.grid, with_y)
    }
}

// x^i exp(-a x^2), orthonormalized with Gram-Schmidt in the grid metric
fn gaussian_orbitals(
    coordinates: ArrayView1<f64>,
    n_orbitals: usize,
    exponent: f64,
    grid: &Grid,
) -> Result<Array2<f64>, ResponseError> {
    let mut orbitals: Array2<f64> = Array2::zeros((n_orbitals, coordinates.len()));
    for i in 0..n_orbitals {
        let mut phi: Array1<f64> = coordinates.mapv(|x| x.powi(i as i32) * (-exponent * x * x).exp());
        for j in 0..i {
            let overlap: f64 = grid.inner(&orbitals.row(j), &phi);
            phi.scaled_add(-overlap, &orbitals.row(j));
        }
        let norm: f64 = grid.norm(&phi);
        if !(norm > 1.0e-10) {
            return Err(ResponseError::invalid(
                "orbital_exponent",
                "the occupied orbitals are linearly dependent on this grid",
            ));
        }
        orbitals.row_mut(i).assign(&(phi / norm));
    }
    Ok(orbitals)
}
