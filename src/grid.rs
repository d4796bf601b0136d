use ndarray::prelude::*;
use ndarray::{Data, Zip};
use serde::{Deserialize, Serialize};

use crate::error::ResponseError;

/// Quadrature grid on which all scalar functions are sampled.
///
/// A function is an `Array1<f64>` with one value per grid point. Inner products and
/// norms are weighted with the quadrature weights of the grid, so that
/// `<f|g> = sum_k w_k f_k g_k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    weights: Array1<f64>,
}

impl Grid {
    pub fn new(weights: Array1<f64>) -> Result<Self, ResponseError> {
        if weights.is_empty() {
            return Err(ResponseError::invalid("weights", "the grid has no points"));
        }
        if weights.iter().any(|w| !(*w >= 0.0)) {
            return Err(ResponseError::invalid(
                "weights",
                "quadrature weights must be non-negative",
            ));
        }
        Ok(Self { weights })
    }

    /// Equidistant grid with `n_points` points, every point carrying the weight `spacing`.
    pub fn uniform(n_points: usize, spacing: f64) -> Result<Self, ResponseError> {
        Self::new(Array1::from_elem(n_points, spacing))
    }

    pub fn n_points(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> ArrayView1<f64> {
        self.weights.view()
    }

    pub fn inner<S, T>(&self, f: &ArrayBase<S, Ix1>, g: &ArrayBase<T, Ix1>) -> f64
    where
        S: Data<Elem = f64>,
        T: Data<Elem = f64>,
    {
        Zip::from(f)
            .and(g)
            .and(&self.weights)
            .fold(0.0, |acc, a, b, w| acc + w * a * b)
    }

    pub fn norm<S>(&self, f: &ArrayBase<S, Ix1>) -> f64
    where
        S: Data<Elem = f64>,
    {
        self.inner(f, f).sqrt()
    }

    /// Sum of the squared norms of all functions stored along the last axis.
    pub fn norm_sqr_all<S, D>(&self, f: &ArrayBase<S, D>) -> f64
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let last: usize = f.ndim() - 1;
        f.lanes(Axis(last))
            .into_iter()
            .map(|lane| self.inner(&lane, &lane))
            .sum()
    }
}

/// Projector onto the complement of the occupied space, `Q = 1 - sum_i |phi_i><phi_i|`.
///
/// The occupied orbitals are expected to be orthonormal with respect to the grid weights.
#[derive(Debug, Clone)]
pub struct QProjector {
    orbitals: Array2<f64>,
    grid: Grid,
}

impl QProjector {
    pub fn new(orbitals: Array2<f64>, grid: &Grid) -> Result<Self, ResponseError> {
        ResponseError::check_shape(
            "occupied orbitals",
            &[orbitals.nrows(), grid.n_points()],
            orbitals.shape(),
        )?;
        Ok(Self {
            orbitals,
            grid: grid.clone(),
        })
    }

    pub fn apply<S>(&self, f: &ArrayBase<S, Ix1>) -> Array1<f64>
    where
        S: Data<Elem = f64>,
    {
        let mut qf: Array1<f64> = f.to_owned();
        for phi in self.orbitals.outer_iter() {
            let overlap: f64 = self.grid.inner(&phi, f);
            qf.scaled_add(-overlap, &phi);
        }
        qf
    }
}
