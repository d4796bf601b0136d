//! Restart files of the response amplitudes.
//!
//! A checkpoint is an NPZ archive with the entries
//!
//! * `meta`: `[version, has_y, m, n, n_points]`
//! * `x`: X channel, shape `(m, n, n_points)`
//! * `y`: Y channel of the same shape, only for non-zero frequencies
use std::fs::File;
use std::path::Path;

use log::info;
use ndarray::prelude::*;
use ndarray_npy::{NpzReader, NpzWriter};

use crate::defaults::CHECKPOINT_VERSION;
use crate::error::ResponseError;
use crate::parallel::Communicator;
use crate::response::state::ResponseState;

/// Writes the response state. Only the coordinator touches the file, every process
/// passes both fences even if the write fails.
pub fn save<C: Communicator>(
    world: &C,
    path: &Path,
    state: &ResponseState,
) -> Result<(), ResponseError> {
    world.fence();
    let written: Result<(), ResponseError> = if world.is_coordinator() {
        write_checkpoint(path, state)
    } else {
        Ok(())
    };
    world.fence();
    written
}

fn write_checkpoint(path: &Path, state: &ResponseState) -> Result<(), ResponseError> {
    let meta: Array1<u64> = array![
        CHECKPOINT_VERSION,
        state.has_y() as u64,
        state.num_states() as u64,
        state.num_orbitals() as u64,
        state.n_points() as u64
    ];
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("meta", &meta)?;
    npz.add_array("x", &state.x)?;
    if let Some(y) = state.y.as_ref() {
        npz.add_array("y", y)?;
    }
    npz.finish()?;
    info!("response amplitudes written to {}", path.display());
    Ok(())
}

/// Reads a response state with `n_states` states of `n_orbitals` functions each. The
/// fence is passed whether the file could be read or not.
pub fn load<C: Communicator>(
    world: &C,
    path: &Path,
    n_states: usize,
    n_orbitals: usize,
) -> Result<ResponseState, ResponseError> {
    let state: Result<ResponseState, ResponseError> = read_checkpoint(path, n_states, n_orbitals);
    world.fence();
    state
}

fn read_checkpoint(
    path: &Path,
    n_states: usize,
    n_orbitals: usize,
) -> Result<ResponseState, ResponseError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names: Vec<String> = npz.names()?;

    let meta: Array1<u64> = npz.by_name(entry_name(&names, "meta")?)?;
    if meta.len() != 5 {
        return Err(ResponseError::CheckpointFormat(format!(
            "metadata has {} entries instead of 5",
            meta.len()
        )));
    }
    if meta[0] != CHECKPOINT_VERSION {
        return Err(ResponseError::CheckpointVersion(meta[0]));
    }
    let (has_y, m, n, n_points) = (meta[1] != 0, meta[2] as usize, meta[3] as usize, meta[4] as usize);
    if m != n_states || n != n_orbitals {
        return Err(ResponseError::CheckpointShape {
            states: n_states,
            orbitals: n_orbitals,
            found_states: m,
            found_orbitals: n,
        });
    }

    let x: Array3<f64> = npz.by_name(entry_name(&names, "x")?)?;
    ResponseError::check_shape("checkpoint X channel", &[m, n, n_points], x.shape())?;
    let y: Option<Array3<f64>> = if has_y {
        let y: Array3<f64> = npz.by_name(entry_name(&names, "y")?)?;
        Some(y)
    } else {
        None
    };
    ResponseState::from_channels(x, y)
}

// entry names are stored with or without the `.npy` suffix depending on the writer
fn entry_name<'a>(names: &'a [String], entry: &str) -> Result<&'a str, ResponseError> {
    names
        .iter()
        .find(|name| name.as_str() == entry || name.strip_suffix(".npy") == Some(entry))
        .map(|name| name.as_str())
        .ok_or_else(|| ResponseError::CheckpointFormat(format!("entry `{}` is missing", entry)))
}
