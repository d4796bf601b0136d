#![allow(dead_code)]
use std::cell::Cell;

use frequency_response::grid::Grid;
use frequency_response::response::{
    project_perturbation, ConvergenceTargets, GridModel, GroundState, ObservableExtractor,
    PrecisionSchedule, ResponseKernel, ResponseState, TransitionDensity,
};
use ndarray::prelude::*;

/// Targets that do not depend on a threshold.
pub struct FixedTargets(pub ConvergenceTargets);

impl PrecisionSchedule for FixedTargets {
    fn thresh(&self) -> f64 {
        1.0e-6
    }

    fn targets(&self) -> ConvergenceTargets {
        self.0
    }
}

/// Eight grid points in two blocks of four. The single occupied orbital lives on the
/// first block, the kinetic profile and the potential are constant on each block.
/// Without a kernel the response equation on the first block is a scalar equation,
/// `(t_a + v_a - e -/+ omega) x = -PQ`.
pub struct BlockSystem {
    pub grid: Grid,
    pub ground: GroundState,
    pub model: GridModel,
    pub perturbations: Array2<f64>,
    pub kinetic: [f64; 2],
    pub potential: [f64; 2],
    pub energy: f64,
}

impl BlockSystem {
    pub fn new(kinetic: [f64; 2], potential: [f64; 2], energy: f64) -> Self {
        let grid = Grid::uniform(8, 0.5).unwrap();
        let s: f64 = 1.0 / 2.0_f64.sqrt();
        let orbitals: Array2<f64> = array![[s, -s, s, -s, 0.0, 0.0, 0.0, 0.0]];
        let ground = GroundState::new(orbitals, array![energy]).unwrap();
        let block = |values: [f64; 2]| -> Array1<f64> {
            Array1::from_shape_fn(8, |k| if k < 4 { values[0] } else { values[1] })
        };
        let model = GridModel::new(
            block(kinetic),
            block(potential),
            &ground,
            ResponseKernel::none(),
        )
        .unwrap();
        let perturbations: Array2<f64> = array![
            [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, 4.0, 9.0, 16.0, 0.0, 0.0, 0.0, 0.0]
        ];
        Self {
            grid,
            ground,
            model,
            perturbations,
            kinetic,
            potential,
            energy,
        }
    }

    /// The system in which every solver feature is tested, weakly bound enough for a
    /// quick convergence of the plain iteration.
    pub fn analytic() -> Self {
        Self::new([1.0, 2.0], [-0.3, -0.2], -0.5)
    }

    pub fn perturbation(&self, with_y: bool) -> ResponseState {
        project_perturbation(self.perturbations.view(), &self.ground, &self.grid, with_y).unwrap()
    }

    pub fn density(&self) -> TransitionDensity {
        TransitionDensity::new(&self.ground)
    }

    /// Exact response amplitudes of the model without kernel.
    pub fn exact(&self, omega: f64) -> ResponseState {
        let pq: ResponseState = self.perturbation(omega != 0.0);
        let h: f64 = self.kinetic[0] + self.potential[0] - self.energy;
        let x: Array3<f64> = &pq.x / -(h - omega);
        let y: Option<Array3<f64>> = pq.y.as_ref().map(|y| y / -(h + omega));
        ResponseState::from_channels(x, y).unwrap()
    }
}

/// Response densities that are inflated by a large factor from the `from`-th call on.
pub struct InflatingDensity {
    pub inner: TransitionDensity,
    pub calls: Cell<usize>,
    pub from: usize,
}

impl InflatingDensity {
    pub fn new(inner: TransitionDensity, from: usize) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
            from,
        }
    }
}

impl ObservableExtractor for InflatingDensity {
    fn observable(&self, chi: &ResponseState) -> Array2<f64> {
        let call: usize = self.calls.get();
        self.calls.set(call + 1);
        let rho: Array2<f64> = self.inner.observable(chi);
        if call >= self.from {
            rho * 1.0e6
        } else {
            rho
        }
    }
}

pub fn max(values: ArrayView1<f64>) -> f64 {
    values.iter().cloned().fold(0.0, f64::max)
}
