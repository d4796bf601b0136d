use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::error::ResponseError;
use crate::grid::Grid;

/// The two amplitude channels of a response state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    /// excitation amplitudes
    X,
    /// de-excitation amplitudes, only present for non-zero frequencies
    Y,
}

impl Channel {
    pub fn index(self) -> usize {
        match self {
            Channel::X => 0,
            Channel::Y => 1,
        }
    }
}

/// Response amplitudes of `m` perturbations, each with one function per occupied orbital.
///
/// Both channels are stored as arrays of shape `(m, n, n_points)`. For the static
/// response only `x` is allocated and the Y channel is identical to X wherever a
/// symmetric pair is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseState {
    pub x: Array3<f64>,
    pub y: Option<Array3<f64>>,
}

impl ResponseState {
    pub fn zeros(n_states: usize, n_orbitals: usize, n_points: usize, with_y: bool) -> Self {
        let shape = (n_states, n_orbitals, n_points);
        Self {
            x: Array3::zeros(shape),
            y: if with_y { Some(Array3::zeros(shape)) } else { None },
        }
    }

    pub fn from_channels(x: Array3<f64>, y: Option<Array3<f64>>) -> Result<Self, ResponseError> {
        if let Some(y) = y.as_ref() {
            ResponseError::check_shape("Y channel", x.shape(), y.shape())?;
        }
        Ok(Self { x, y })
    }

    pub fn num_states(&self) -> usize {
        self.x.dim().0
    }

    pub fn num_orbitals(&self) -> usize {
        self.x.dim().1
    }

    pub fn n_points(&self) -> usize {
        self.x.dim().2
    }

    pub fn has_y(&self) -> bool {
        self.y.is_some()
    }

    pub fn n_channels(&self) -> usize {
        if self.has_y() {
            2
        } else {
            1
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.num_states(), self.num_orbitals(), self.n_points()]
    }

    /// The Y channel, or X if the state is static.
    pub fn y_or_x(&self) -> ArrayView3<f64> {
        match self.y.as_ref() {
            Some(y) => y.view(),
            None => self.x.view(),
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> Option<ArrayViewMut3<f64>> {
        match channel {
            Channel::X => Some(self.x.view_mut()),
            Channel::Y => self.y.as_mut().map(|y| y.view_mut()),
        }
    }

    /// Fails if `other` does not have the same shape and channel layout.
    pub fn check_same_layout(&self, other: &Self, what: &'static str) -> Result<(), ResponseError> {
        ResponseError::check_shape(what, self.x.shape(), other.x.shape())?;
        match (self.y.as_ref(), other.y.as_ref()) {
            (Some(_), Some(y)) => ResponseError::check_shape(what, self.x.shape(), y.shape()),
            (None, None) => Ok(()),
            (Some(_), None) => Err(ResponseError::ShapeMismatch {
                what,
                expected: vec![2],
                found: vec![1],
            }),
            (None, Some(_)) => Err(ResponseError::ShapeMismatch {
                what,
                expected: vec![1],
                found: vec![2],
            }),
        }
    }

    /// Norm of every state. For two channels the norm of the pair `(x_b, y_b)` is returned.
    pub fn norms(&self, grid: &Grid) -> Array1<f64> {
        (0..self.num_states())
            .map(|b| {
                let mut norm_sqr: f64 = grid.norm_sqr_all(&self.x.index_axis(Axis(0), b));
                if let Some(y) = self.y.as_ref() {
                    norm_sqr += grid.norm_sqr_all(&y.index_axis(Axis(0), b));
                }
                norm_sqr.sqrt()
            })
            .collect()
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self {
            x: &self.x - &other.x,
            y: match (self.y.as_ref(), other.y.as_ref()) {
                (Some(a), Some(b)) => Some(a - b),
                (Some(a), None) => Some(a - &other.x),
                (None, _) => None,
            },
        }
    }

    /// Matrix of inner products `M[a, b] = sum_i <self_ai|other_bi>`, summed over both
    /// channels if the state carries a Y channel.
    pub fn inner(&self, other: &Self, grid: &Grid) -> Array2<f64> {
        let mut matrix: Array2<f64> = channel_inner(self.x.view(), other.x.view(), grid);
        if let Some(y) = self.y.as_ref() {
            matrix += &channel_inner(y.view(), other.y_or_x(), grid);
        }
        matrix
    }

    /// Copies the functions of the given states from `other`.
    pub fn copy_states_from<I>(&mut self, other: &Self, states: I)
    where
        I: IntoIterator<Item = usize>,
    {
        for b in states {
            self.x
                .index_axis_mut(Axis(0), b)
                .assign(&other.x.index_axis(Axis(0), b));
            if let (Some(y), Some(other_y)) = (self.y.as_mut(), other.y.as_ref()) {
                y.index_axis_mut(Axis(0), b)
                    .assign(&other_y.index_axis(Axis(0), b));
            }
        }
    }
}

fn channel_inner(a: ArrayView3<f64>, b: ArrayView3<f64>, grid: &Grid) -> Array2<f64> {
    let mut matrix: Array2<f64> = Array2::zeros((a.dim().0, b.dim().0));
    Zip::indexed(&mut matrix).for_each(|(i, j), value| {
        *value = a
            .index_axis(Axis(0), i)
            .outer_iter()
            .zip(b.index_axis(Axis(0), j).outer_iter())
            .map(|(f, g)| grid.inner(&f, &g))
            .sum();
    });
    matrix
}

/// Indices of the states that are still iterated.
///
/// The set is recomputed from the convergence flags in every iteration instead of
/// being pruned in place, a state that converged once stays inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    mask: Vec<bool>,
}

impl ActiveSet {
    pub fn all(n_states: usize) -> Self {
        Self {
            mask: vec![true; n_states],
        }
    }

    pub fn from_converged(converged: &[bool]) -> Self {
        Self {
            mask: converged.iter().map(|c| !c).collect(),
        }
    }

    pub fn contains(&self, state: usize) -> bool {
        self.mask.get(state).copied().unwrap_or(false)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(b, active)| if *active { Some(b) } else { None })
    }

    pub fn len(&self) -> usize {
        self.mask.iter().filter(|active| **active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.indices().collect()
    }
}
