//! Error types of the response solver.
//!
//! All errors derive [`thiserror::Error`] so that the command line program can
//! wrap them with [`anyhow`] context.
use ndarray_npy::{ReadNpzError, WriteNpzError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponseError {
    /// An operator provider or a caller handed over a collection of functions
    /// that does not have the shape of the response state.
    #[error("{what}: expected shape {expected:?}, got {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The restart file describes a different response problem than the one requested.
    #[error(
        "checkpoint declares {found_states} states x {found_orbitals} orbitals, \
         but {states} states x {orbitals} orbitals were requested"
    )]
    CheckpointShape {
        states: usize,
        orbitals: usize,
        found_states: usize,
        found_orbitals: usize,
    },

    #[error("unsupported checkpoint version {0}")]
    CheckpointVersion(u64),

    #[error("malformed checkpoint: {0}")]
    CheckpointFormat(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not write checkpoint: {0}")]
    NpzWrite(#[from] WriteNpzError),

    #[error("could not read checkpoint: {0}")]
    NpzRead(#[from] ReadNpzError),
}

impl ResponseError {
    pub(crate) fn check_shape(
        what: &'static str,
        expected: &[usize],
        found: &[usize],
    ) -> Result<(), Self> {
        (expected == found).then(|| ()).ok_or_else(|| Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
