use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ResponseError;
use crate::grid::Grid;
use crate::response::state::ResponseState;

/// Prefactor of the polarizability contraction `<chi_a|PQ_b>`. The static response
/// carries only the X channel, which stands for both X and Y.
pub fn property_scale(n_channels: usize) -> f64 {
    if n_channels == 1 {
        -4.0
    } else {
        -2.0
    }
}

/// Polarizability-like tensor `alpha[a, b] = scale * sum_i <chi_ai|PQ_bi>`, summed over
/// the channels of `chi`.
pub fn property_tensor(chi: &ResponseState, pq: &ResponseState, grid: &Grid) -> Array2<f64> {
    chi.inner(pq, grid) * property_scale(chi.n_channels())
}

/// Snapshot of one response iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// seconds per phase of the iteration
    pub timings: BTreeMap<String, f64>,
    pub norms: Array1<f64>,
    pub residuals: Array1<f64>,
    pub relative_residuals: Array1<f64>,
    pub density_residuals: Array1<f64>,
    pub density_norms: Array1<f64>,
    /// states that were iterated
    pub active: Vec<usize>,
    pub polarizability: Array2<f64>,
    pub residual_polarizability: Array2<f64>,
}

/// All records of a calculation, possibly spanning several protocol stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub frequency: f64,
    pub stages: Vec<StageDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    pub thresh: f64,
    pub status: String,
    pub iterations: Vec<IterationRecord>,
}

impl Diagnostics {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            stages: Vec::new(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ResponseError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|err| ResponseError::Io(err.into()))
    }
}
