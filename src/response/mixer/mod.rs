use ndarray::prelude::*;
use rayon::prelude::*;

use crate::error::ResponseError;
use crate::grid::Grid;
use crate::response::state::{ActiveSet, Channel, ResponseState};

pub mod anderson;
pub use anderson::AndersonMixer;

/// Trait that allows the extrapolation of a single function from the current iterate and
/// its residual, used to accelerate the response iterations.
pub trait Mixer {
    fn mix(&mut self, x: ArrayView1<f64>, r: ArrayView1<f64>, grid: &Grid) -> Array1<f64>;
    fn reset(&mut self);
}

/// Bijection between `(state, orbital, channel)` and the flat slot index
/// `(state * n_channels + channel) * n_orbitals + orbital`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotIndex {
    pub n_states: usize,
    pub n_orbitals: usize,
    pub n_channels: usize,
}

impl SlotIndex {
    pub fn new(n_states: usize, n_orbitals: usize, n_channels: usize) -> Self {
        Self {
            n_states,
            n_orbitals,
            n_channels,
        }
    }

    pub fn of(chi: &ResponseState) -> Self {
        Self::new(chi.num_states(), chi.num_orbitals(), chi.n_channels())
    }

    pub fn len(&self) -> usize {
        self.n_states * self.n_channels * self.n_orbitals
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, state: usize, orbital: usize, channel: Channel) -> usize {
        (state * self.n_channels + channel.index()) * self.n_orbitals + orbital
    }

    pub fn decompose(&self, slot: usize) -> (usize, usize, Channel) {
        let orbital: usize = slot % self.n_orbitals;
        let rest: usize = slot / self.n_orbitals;
        let channel: Channel = if rest % self.n_channels == 0 {
            Channel::X
        } else {
            Channel::Y
        };
        (rest / self.n_channels, orbital, channel)
    }
}

/// One independent mixer per function of the response state.
pub struct SubspaceAccelerator<M = AndersonMixer> {
    slots: SlotIndex,
    mixers: Vec<M>,
}

impl SubspaceAccelerator<AndersonMixer> {
    pub fn new(slots: SlotIndex, maxsub: usize) -> Self {
        Self::with_mixers(slots, |_| AndersonMixer::new(maxsub))
    }
}

impl<M> SubspaceAccelerator<M>
where
    M: Mixer + Send,
{
    pub fn with_mixers<F>(slots: SlotIndex, factory: F) -> Self
    where
        F: Fn(usize) -> M,
    {
        Self {
            slots,
            mixers: (0..slots.len()).map(factory).collect(),
        }
    }

    pub fn reset(&mut self) {
        self.mixers.iter_mut().for_each(|mixer| mixer.reset());
    }

    /// Extrapolates every function of the active states from the iterate `chi` and the
    /// residual `candidate - chi`. Functions of inactive states are returned unchanged and
    /// their mixers keep their history.
    pub fn update(
        &mut self,
        chi: &ResponseState,
        residual: &ResponseState,
        active: &ActiveSet,
        grid: &Grid,
    ) -> Result<ResponseState, ResponseError> {
        let expected: [usize; 3] = [self.slots.n_states, self.slots.n_orbitals, self.slots.n_channels];
        let found: [usize; 3] = [chi.num_states(), chi.num_orbitals(), chi.n_channels()];
        ResponseError::check_shape("accelerator slots", &expected, &found)?;
        chi.check_same_layout(residual, "residual")?;

        let slots: SlotIndex = self.slots;
        let updates: Vec<(usize, Array1<f64>)> = self
            .mixers
            .par_iter_mut()
            .enumerate()
            .filter(|(slot, _)| active.contains(slots.decompose(*slot).0))
            .map(|(slot, mixer)| {
                let (b, i, channel) = slots.decompose(slot);
                let x = lane(chi, b, i, channel);
                let r = lane(residual, b, i, channel);
                (slot, mixer.mix(x, r, grid))
            })
            .collect();

        let mut result: ResponseState = chi.clone();
        for (slot, function) in updates {
            let (b, i, channel) = slots.decompose(slot);
            if let Some(mut target) = result.channel_mut(channel) {
                target.slice_mut(s![b, i, ..]).assign(&function);
            }
        }
        Ok(result)
    }
}

fn lane(chi: &ResponseState, state: usize, orbital: usize, channel: Channel) -> ArrayView1<f64> {
    match channel {
        Channel::X => chi.x.slice(s![state, orbital, ..]),
        Channel::Y => chi.y_or_x().slice_move(s![state, orbital, ..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_is_a_bijection() {
        for &n_channels in [1, 2].iter() {
            let slots = SlotIndex::new(3, 4, n_channels);
            let channels: &[Channel] = if n_channels == 1 {
                &[Channel::X]
            } else {
                &[Channel::X, Channel::Y]
            };
            let mut seen: Vec<bool> = vec![false; slots.len()];
            for b in 0..3 {
                for &c in channels {
                    for i in 0..4 {
                        let slot: usize = slots.index(b, i, c);
                        assert!(!seen[slot]);
                        seen[slot] = true;
                        assert_eq!(slots.decompose(slot), (b, i, c));
                    }
                }
            }
            assert!(seen.iter().all(|s| *s));
        }
    }

    #[test]
    fn y_slots_follow_x_slots_of_the_same_state() {
        let slots = SlotIndex::new(2, 3, 2);
        assert_eq!(slots.index(0, 0, Channel::Y), 3);
        assert_eq!(slots.index(1, 0, Channel::X), 6);
    }

    #[test]
    fn inactive_states_pass_through() {
        let grid = Grid::uniform(2, 1.0).unwrap();
        let mut chi = ResponseState::zeros(2, 1, 2, true);
        chi.x.fill(1.0);
        let mut residual = ResponseState::zeros(2, 1, 2, true);
        residual.x.fill(0.5);
        residual.y.as_mut().unwrap().fill(0.25);
        let mut accelerator = SubspaceAccelerator::new(SlotIndex::of(&chi), 3);
        let active = ActiveSet::from_converged(&[false, true]);
        let result = accelerator.update(&chi, &residual, &active, &grid).unwrap();
        let y: &Array3<f64> = result.y.as_ref().unwrap();
        assert!(result.x.slice(s![0, .., ..]).abs_diff_eq(&Array2::from_elem((1, 2), 1.5), 1e-14));
        assert!(y.slice(s![0, .., ..]).abs_diff_eq(&Array2::from_elem((1, 2), 0.25), 1e-14));
        // frozen states are copied, not extrapolated
        assert!(result.x.slice(s![1, .., ..]).iter().all(|v| *v == 1.0));
        assert!(y.slice(s![1, .., ..]).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn first_pair_gives_the_candidate_exactly() {
        let grid = Grid::uniform(2, 1.0).unwrap();
        let mut chi = ResponseState::zeros(1, 1, 2, true);
        chi.x.fill(1.0);
        let mut residual = ResponseState::zeros(1, 1, 2, true);
        residual.x.fill(0.5);
        residual.y.as_mut().unwrap().fill(0.25);
        let mut accelerator = SubspaceAccelerator::new(SlotIndex::of(&chi), 3);
        let active = ActiveSet::all(1);
        accelerator.update(&chi, &residual, &active, &grid).unwrap();

        // after a reset the history is gone and the next step is the raw candidate again
        accelerator.reset();
        let result = accelerator.update(&chi, &residual, &active, &grid).unwrap();
        assert!(result.x.iter().all(|v| *v == 1.5));
        assert!(result.y.as_ref().unwrap().iter().all(|v| *v == 0.25));
    }

    #[test]
    fn layout_changes_are_rejected() {
        let grid = Grid::uniform(2, 1.0).unwrap();
        let chi = ResponseState::zeros(2, 1, 2, false);
        let mut accelerator = SubspaceAccelerator::new(SlotIndex::new(2, 1, 2), 3);
        let active = ActiveSet::all(2);
        assert!(accelerator.update(&chi, &chi, &active, &grid).is_err());
    }
}
