use std::collections::VecDeque;

use itertools::izip;
use log::trace;
use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;

use crate::defaults;
use crate::grid::Grid;
use crate::response::mixer::Mixer;

/// Anderson (DIIS/KAIN type) mixer for a single function.
///
/// The mixer keeps the last `maxsub` pairs of iterates `x_j` and residuals `r_j` and
/// extrapolates the next iterate as `sum_j c_j (x_j + r_j)`, where the coefficients
/// minimize `|sum_j c_j r_j|` under the constraint `sum_j c_j = 1`.
/// See P. Pulay, Chem. Phys. Lett. 73, 393 (1980) and
/// R. J. Harrison, J. Comput. Chem. 25, 328 (2004).
#[derive(Debug, Clone)]
pub struct AndersonMixer {
    // maximal number of stored pairs
    maxsub: usize,
    iterates: VecDeque<Array1<f64>>,
    residuals: VecDeque<Array1<f64>>,
}

impl AndersonMixer {
    pub fn new(maxsub: usize) -> Self {
        Self {
            maxsub,
            iterates: VecDeque::with_capacity(maxsub + 1),
            residuals: VecDeque::with_capacity(maxsub + 1),
        }
    }

    pub fn subspace_size(&self) -> usize {
        self.residuals.len()
    }

    /// Solves the Pulay equations
    ///
    ///   | B   -1 | |c     |   | 0 |
    ///   | -1   0 | |lambda| = |-1 |
    ///
    /// with `B_ij = <r_i|r_j>`. The SVD based solution also handles linearly dependent
    /// residuals, in the worst case only the last pair is used. A single pair is taken
    /// as it is.
    fn coefficients(&self, grid: &Grid) -> Array1<f64> {
        let k: usize = self.residuals.len();
        if k == 1 {
            return array![1.0];
        }
        let mut b: DMatrix<f64> = DMatrix::zeros(k + 1, k + 1);
        for (i, r_i) in self.residuals.iter().enumerate() {
            for (j, r_j) in self.residuals.iter().enumerate().take(i + 1) {
                let overlap: f64 = grid.inner(r_i, r_j);
                b[(i, j)] = overlap;
                b[(j, i)] = overlap;
            }
        }
        // normalize by the largest diagonal element
        let max: f64 = (0..k).map(|i| b[(i, i)]).fold(0.0, f64::max);
        if max > 0.0 {
            for i in 0..k {
                for j in 0..k {
                    b[(i, j)] /= max;
                }
            }
        }
        for i in 0..k {
            b[(i, k)] = -1.0;
            b[(k, i)] = -1.0;
        }
        let mut rhs: DVector<f64> = DVector::zeros(k + 1);
        rhs[k] = -1.0;

        let solution: Option<DVector<f64>> = b
            .svd(true, true)
            .solve(&rhs, defaults::SUBSPACE_SVD_EPS)
            .ok()
            .filter(|c| c.iter().all(|x| x.is_finite()));

        match solution {
            Some(c) => Array1::from_iter(c.iter().take(k).cloned()),
            None => {
                trace!("subspace equations could not be solved, the last iterate is used");
                let mut c: Array1<f64> = Array1::zeros(k);
                c[k - 1] = 1.0;
                c
            }
        }
    }
}

impl Mixer for AndersonMixer {
    fn mix(&mut self, x: ArrayView1<f64>, r: ArrayView1<f64>, grid: &Grid) -> Array1<f64> {
        self.iterates.push_back(x.to_owned());
        self.residuals.push_back(r.to_owned());
        if self.residuals.len() > self.maxsub {
            self.iterates.pop_front();
            self.residuals.pop_front();
        }

        let c: Array1<f64> = self.coefficients(grid);
        let mut x_new: Array1<f64> = Array1::zeros(x.len());
        for (c_j, x_j, r_j) in izip!(c.iter(), self.iterates.iter(), self.residuals.iter()) {
            x_new.scaled_add(*c_j, x_j);
            x_new.scaled_add(*c_j, r_j);
        }
        x_new
    }

    fn reset(&mut self) {
        self.iterates.clear();
        self.residuals.clear();
    }
}
