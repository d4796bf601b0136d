use ndarray::prelude::*;
use ndarray_stats::errors::MinMaxError;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::response::operators::ConvergenceTargets;
use crate::response::state::{ActiveSet, ResponseState};

/// Residuals of every response state. Entries of inactive states keep their last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRecord {
    /// norm of `candidate - previous`
    pub amplitude: Array1<f64>,
    /// amplitude residual divided by the norm of the current amplitudes
    pub relative: Array1<f64>,
    /// norm of the change of the response density
    pub density: Array1<f64>,
}

impl ResidualRecord {
    pub fn new(n_states: usize) -> Self {
        Self {
            amplitude: Array1::zeros(n_states),
            relative: Array1::zeros(n_states),
            density: Array1::zeros(n_states),
        }
    }

    /// Stores the amplitude residuals `|candidate_b - previous_b|` of the active states.
    /// For two channels the residual of the pair `(x_b, y_b)` is used.
    pub fn update_amplitude(
        &mut self,
        residual: &ResponseState,
        grid: &Grid,
        active: &ActiveSet,
    ) {
        let norms: Array1<f64> = residual.norms(grid);
        for b in active.indices() {
            self.amplitude[b] = norms[b];
        }
    }

    /// Relative residuals of the active states with respect to the amplitude norms of `chi`.
    /// A vanishing state with vanishing residual has the relative residual zero.
    pub fn update_relative(&mut self, chi: &ResponseState, grid: &Grid, active: &ActiveSet) {
        let norms: Array1<f64> = chi.norms(grid);
        for b in active.indices() {
            self.relative[b] = match (norms[b] > 0.0, self.amplitude[b] > 0.0) {
                (true, _) => self.amplitude[b] / norms[b],
                (false, false) => 0.0,
                (false, true) => f64::INFINITY,
            };
        }
    }

    /// Density residuals `|rho_old_b - rho_new_b|` of the active states.
    pub fn update_density(
        &mut self,
        rho_old: ArrayView2<f64>,
        rho_new: ArrayView2<f64>,
        grid: &Grid,
        active: &ActiveSet,
    ) {
        for b in active.indices() {
            let diff: Array1<f64> = &rho_old.row(b) - &rho_new.row(b);
            self.density[b] = grid.norm(&diff);
        }
    }

    /// Largest density residual of all states, active or not. A NaN counts as infinite.
    pub fn max_density(&self) -> f64 {
        match self.density.max() {
            Ok(x) => *x,
            Err(MinMaxError::EmptyInput) => 0.0,
            Err(MinMaxError::UndefinedOrder) => f64::INFINITY,
        }
    }
}

/// Convergence criterion of a single state, both residuals have to be strictly below
/// their targets.
pub fn is_converged(relative: f64, density: f64, targets: &ConvergenceTargets) -> bool {
    relative < targets.relative && density < targets.density
}

/// Evaluates the convergence of the states in `active` and returns the updated flags.
/// The flags of states that are already inactive are not touched.
pub fn check_convergence(
    record: &ResidualRecord,
    converged: &[bool],
    active: &ActiveSet,
    targets: &ConvergenceTargets,
) -> Vec<bool> {
    let mut flags: Vec<bool> = converged.to_vec();
    for b in active.indices() {
        flags[b] = is_converged(record.relative[b], record.density[b], targets);
    }
    flags
}

/// Safety abort for diverging iterations.
pub fn is_diverging(
    record: &ResidualRecord,
    iteration: usize,
    warmup: usize,
    factor: f64,
    targets: &ConvergenceTargets,
) -> bool {
    iteration > warmup && record.max_density() > factor * targets.density
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn targets() -> ConvergenceTargets {
        ConvergenceTargets {
            relative: 1.0e-3,
            density: 1.0e-2,
        }
    }

    #[test]
    fn residual_at_target_is_not_converged() {
        let t = targets();
        assert!(!is_converged(t.relative, 0.0, &t));
        assert!(!is_converged(0.0, t.density, &t));
        assert!(is_converged(0.999e-3, 0.999e-2, &t));
    }

    #[test]
    fn only_active_states_are_checked() {
        let mut record = ResidualRecord::new(3);
        record.relative = array![1.0e-4, 1.0e-4, 1.0];
        record.density = array![1.0e-3, 1.0e-3, 1.0e-3];
        // state 1 is already converged, state 0 converges now, state 2 does not
        let converged: Vec<bool> = vec![false, true, false];
        let active = ActiveSet::from_converged(&converged);
        let flags: Vec<bool> = check_convergence(&record, &converged, &active, &targets());
        assert_eq!(flags, vec![true, true, false]);
        let next = ActiveSet::from_converged(&flags);
        assert_eq!(next.to_vec(), vec![2]);
        assert!(next.len() <= active.len());
    }

    #[test]
    fn residuals_of_frozen_states_are_kept() {
        let grid = Grid::uniform(2, 1.0).unwrap();
        let mut record = ResidualRecord::new(2);
        record.amplitude[0] = 0.5;
        let mut residual = ResponseState::zeros(2, 1, 2, false);
        residual.x.fill(1.0);
        let active = ActiveSet::from_converged(&[true, false]);
        record.update_amplitude(&residual, &grid, &active);
        assert_abs_diff_eq!(record.amplitude[0], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(record.amplitude[1], (2.0_f64).sqrt(), epsilon = 1e-14);

        let rho_old: Array2<f64> = array![[1.0, 1.0], [1.0, 1.0]];
        let rho_new: Array2<f64> = array![[0.0, 0.0], [1.0, 4.0]];
        record.update_density(rho_old.view(), rho_new.view(), &grid, &active);
        assert_abs_diff_eq!(record.density[0], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(record.density[1], 3.0, epsilon = 1e-14);
    }

    #[test]
    fn divergence_needs_warmup() {
        let mut record = ResidualRecord::new(2);
        record.density = array![0.0, 0.5];
        let t = targets();
        assert!(!is_diverging(&record, 5, 5, 20.0, &t));
        assert!(is_diverging(&record, 6, 5, 20.0, &t));
        record.density = array![0.0, 0.1];
        assert!(!is_diverging(&record, 6, 5, 20.0, &t));
    }
}
